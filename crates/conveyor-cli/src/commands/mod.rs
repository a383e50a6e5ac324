//! CLI command implementations.

pub mod run;
pub mod serve;

use anyhow::Result;

pub fn validate(path: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    match conveyor_config::parse_pipeline(&content) {
        Ok(pipeline) => {
            println!("Configuration is valid");
            println!(
                "Pipeline '{}' watches {}@{}",
                pipeline.name, pipeline.watch.repository, pipeline.watch.branch
            );
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
