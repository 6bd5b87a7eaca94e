//! Stage 6: collect secrets and write the config file from its template.
//!
//! Nothing is written until every prompt has been answered, so an empty
//! required secret (or Ctrl+C) leaves the checkout exactly as fetched. The
//! template is consumed, like a rename, once the config file is in place.

use crate::env_file::{EnvDocument, SetOutcome};
use crate::error::{ProvisionError, Result};
use crate::progress::StageId;
use crate::prompt::Secret;
use crate::runner::{Stage, StageContext};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

pub struct ConfigureStage;

/// Values collected from the operator, keyed by config key
struct Answers {
    secrets: Vec<(String, Secret)>,
    plain: Vec<(String, String)>,
}

impl ConfigureStage {
    fn collect(ctx: &mut StageContext<'_>) -> Result<Answers> {
        let plan = ctx.plan;
        let secrets_plan = &plan.secrets;
        let mut answers = Answers {
            secrets: Vec::new(),
            plain: Vec::new(),
        };

        let required = ctx
            .prompter
            .secret(&format!("Enter {}", secrets_plan.required_key))?;
        if required.is_empty() {
            return Err(ProvisionError::EmptyRequiredInput {
                key: secrets_plan.required_key.clone(),
            });
        }
        answers
            .secrets
            .push((secrets_plan.required_key.clone(), required));

        let Some(optional_key) = &secrets_plan.optional_key else {
            return Ok(answers);
        };
        let optional = ctx
            .prompter
            .secret(&format!("Enter {} (optional, Enter to skip)", optional_key))?;
        if optional.is_empty() {
            ctx.warn(format!(
                "{} not provided; leaving the template placeholder",
                optional_key
            ));
            return Ok(answers);
        }
        answers.secrets.push((optional_key.clone(), optional));

        if let Some(dependent_key) = &secrets_plan.dependent_key {
            let value = ctx.prompter.line(&format!("Enter {}", dependent_key))?;
            if value.is_empty() {
                ctx.warn(format!(
                    "{} not provided; leaving the template default",
                    dependent_key
                ));
            } else {
                answers.plain.push((dependent_key.clone(), value));
            }
        }

        Ok(answers)
    }
}

impl Stage for ConfigureStage {
    fn id(&self) -> StageId {
        StageId::Configure
    }

    fn apply(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        let plan = ctx.plan;
        let template = ctx.in_checkout(&plan.secrets.template);
        let config = ctx.in_checkout(&plan.secrets.config);
        if !ctx.host.path_exists(&template) {
            return Err(ProvisionError::missing_artifact(
                "configuration template",
                template,
            ));
        }

        let answers = Self::collect(ctx)?;

        let mut doc = EnvDocument::parse(&fs::read_to_string(&template)?);
        let values = answers
            .secrets
            .iter()
            .map(|(key, secret)| (key.as_str(), secret.expose()))
            .chain(answers.plain.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let mut appended = Vec::new();
        for (key, value) in values {
            if doc.set(key, value) == SetOutcome::Appended {
                appended.push(key.to_string());
            }
        }
        for key in appended {
            ctx.warn(format!(
                "{} is not in {}; appended to {}",
                key, plan.secrets.template, plan.secrets.config
            ));
        }

        write_private(&config, &doc.render())?;
        fs::remove_file(&template)?;
        tracing::info!(
            "Wrote {} ({} keys substituted)",
            config.display(),
            answers.secrets.len() + answers.plain.len()
        );
        Ok(())
    }

    fn complete(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        let config = ctx.in_checkout(&ctx.plan.secrets.config);
        if ctx.host.path_exists(&config) {
            Ok(())
        } else {
            Err(ProvisionError::missing_artifact("configuration file", config))
        }
    }
}

/// Write `contents` to `path` readable by the owner only
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}
