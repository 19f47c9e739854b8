use anyhow::{bail, Result};
use chainflow::nodes::{IterSource, PrintReport};
use chainflow::{logging, EngineConfig, Model, Payload, Pipeline, Worker};

fn main() -> Result<()> {
    let config = EngineConfig::from_json(serde_json::json!({
        "logging": { "level": "info" },
        "worker": { "shutdown_poll_ms": 5, "fan_out": "shared" }
    }))?;
    logging::init(&config.logging)?;

    println!("chainflow - Source -> Process -> Report demo");
    println!("============================================\n");

    // Demo 1: values flow through and the source's final payload ends every stage.
    let readings = (1..=5).map(|i| [("reading", i * 10)].into_iter().collect::<Model>());
    let mut collect = Worker::source("collect", IterSource::new(readings).with_sequence("seq"))
        .with_config(&config.worker);
    let mut scale = Worker::process("scale", |payload: Payload| -> Result<Payload> {
        let reading = payload.model().get_as::<i64>("reading");
        if let Some(reading) = reading {
            payload.set("scaled", reading as f64 / 100.0);
        }
        Ok(payload)
    })
    .with_config(&config.worker);
    let print = Worker::report("print", PrintReport::new("Demo Output")).with_config(&config.worker);

    collect.link(&[&scale])?;
    scale.link(&[&print])?;

    let mut pipeline = Pipeline::new("demo");
    pipeline.compose(vec![collect, scale, print]);
    let report = pipeline.execute()?;
    println!("\n{}", pipeline.monitor().generate_report());
    println!("completed in {:?}\n", report.duration);

    // Demo 2: a failing stage halts everything behind it.
    let mut collect = Worker::source("collect", IterSource::new(vec![Model::new(); 3]));
    let mut reject = Worker::process("reject", |_payload: Payload| -> Result<Payload> {
        bail!("reading rejected")
    });
    let print = Worker::report("print", PrintReport::new("Never Printed"));

    collect.link(&[&reject])?;
    reject.link(&[&print])?;

    let mut pipeline = Pipeline::new("failing-demo");
    pipeline.compose(vec![collect, reject, print]);
    pipeline.execute()?;
    println!("\n{}", pipeline.monitor().generate_report());

    Ok(())
}
