//! Pipeline definition parsing.

use crate::variables::find_placeholders;
use crate::{ConfigError, ConfigResult};
use conveyor_core::buildspec::{BuildSpec, CommandRecord, Phase};
use conveyor_core::pipeline::PipelineDefinition;
use conveyor_core::source::SourceWatch;
use kdl::{KdlDocument, KdlNode};
use std::collections::HashMap;

/// Parse a pipeline definition from KDL text.
///
/// When no `phase` nodes are present the stock Docker image BuildSpec is
/// used, which reproduces the original build/tag/push phase sequence.
pub fn parse_pipeline(kdl: &str) -> ConfigResult<PipelineDefinition> {
    let doc: KdlDocument = kdl.parse()?;

    let mut name = String::new();
    let mut service = None;
    let mut watch = None;
    let mut repository_uri = None;
    let mut env = HashMap::new();
    let mut phases: HashMap<Phase, Vec<CommandRecord>> = HashMap::new();

    for node in doc.nodes() {
        match node.name().value() {
            "pipeline" => {
                name = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("pipeline name".to_string()))?;
            }
            "service" => {
                service = get_first_string_arg(node);
            }
            "source" => {
                let repository = get_string_prop(node, "repository")
                    .ok_or_else(|| ConfigError::MissingField("source repository".to_string()))?;
                let branch = get_string_prop(node, "branch").unwrap_or_else(|| "main".to_string());
                watch = Some(SourceWatch { repository, branch });
            }
            "registry" => {
                repository_uri = get_string_prop(node, "uri");
            }
            "env" => {
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        let key = child.name().value().to_string();
                        if let Some(val) = get_first_string_arg(child) {
                            env.insert(key, val);
                        }
                    }
                }
            }
            "phase" => {
                let (phase, commands) = parse_phase(node)?;
                if phases.insert(phase, commands).is_some() {
                    return Err(ConfigError::Duplicate(format!("phase \"{}\"", phase)));
                }
            }
            _ => {} // Ignore unknown nodes
        }
    }

    if name.is_empty() {
        return Err(ConfigError::MissingField("pipeline name".to_string()));
    }
    let watch = watch.ok_or_else(|| ConfigError::MissingField("source".to_string()))?;
    let repository_uri =
        repository_uri.ok_or_else(|| ConfigError::MissingField("registry uri".to_string()))?;

    let build = if phases.is_empty() {
        BuildSpec::docker_image()
    } else {
        BuildSpec {
            pre_build: phases.remove(&Phase::PreBuild).unwrap_or_default(),
            build: phases.remove(&Phase::Build).unwrap_or_default(),
            post_build: phases.remove(&Phase::PostBuild).unwrap_or_default(),
            env: HashMap::new(),
        }
    };

    Ok(PipelineDefinition {
        service: service.unwrap_or_else(|| name.clone()),
        name,
        watch,
        repository_uri,
        env,
        build,
    })
}

fn parse_phase(node: &KdlNode) -> ConfigResult<(Phase, Vec<CommandRecord>)> {
    let phase_name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("phase name".to_string()))?;

    let phase = match phase_name.as_str() {
        "pre_build" => Phase::PreBuild,
        "build" => Phase::Build,
        "post_build" => Phase::PostBuild,
        other => {
            return Err(ConfigError::InvalidValue {
                field: "phase".to_string(),
                message: format!("unknown phase: {}", other),
            });
        }
    };

    let mut commands = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "run" {
                let line = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField("run command".to_string()))?;
                commands.push(parse_command(&line, &phase_name)?);
            }
        }
    }

    Ok((phase, commands))
}

/// Split a command line into a typed record. Arguments are whitespace
/// separated; the required variables are derived from the `${NAME}`
/// placeholders the line references.
fn parse_command(line: &str, phase: &str) -> ConfigResult<CommandRecord> {
    let mut parts = line.split_whitespace();
    let program = parts.next().ok_or_else(|| ConfigError::InvalidValue {
        field: format!("phase \"{}\"", phase),
        message: "empty run command".to_string(),
    })?;
    let args: Vec<&str> = parts.collect();
    Ok(CommandRecord::new(program, args).requiring(find_placeholders(line)))
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}
