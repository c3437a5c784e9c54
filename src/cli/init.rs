//! hive init command implementation
//!
//! Creates `.hive.toml` and the data directory under the data root, and
//! saves `--user`/`--name` as the default actor when given.

use std::path::{Path, PathBuf};

use crate::actor::persist_actor;
use crate::cli::GlobalOptions;
use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::hive::{resolve_root, storage_for};
use crate::output::{emit_success, HumanOutput};

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    data_dir: PathBuf,
    created: InitCreated,
    #[serde(skip_serializing_if = "Option::is_none")]
    actor: Option<String>,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    data_dir: bool,
}

pub fn run(global: &GlobalOptions) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let root = match global.dir.as_deref() {
        Some(dir) => resolve_root(Some(dir), &cwd)?,
        None => cwd,
    };
    ensure_dir(&root)?;

    let created_config = ensure_config(&root)?;
    let config = Config::load_from_dir(&root);
    let storage = storage_for(&root, &config);
    let created_data_dir = ensure_dir(storage.data_dir())?;

    let actor = match global.user.as_deref() {
        Some(user) => Some(persist_actor(&storage, user, global.name.as_deref())?),
        None => None,
    };

    let report = InitReport {
        root: root.clone(),
        data_dir: storage.data_dir().to_path_buf(),
        created: InitCreated {
            config: created_config,
            data_dir: created_data_dir,
        },
        actor: actor.as_ref().map(|actor| actor.user_id.clone()),
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE.to_string());
    }
    if created_data_dir {
        created_items.push(format!("{}/", config.storage.dir));
    }

    let header = if created_items.is_empty() && actor.is_none() {
        "hive init: nothing to do".to_string()
    } else {
        "hive init: initialized".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    match &actor {
        Some(actor) => human.push_summary("actor", format!("{} ({})", actor.user_id, actor.display_name)),
        None => human.push_next_step("hive init --user <id> --name <display name>"),
    }
    human.push_next_step("hive project new <name>");

    emit_success(global.output(), "init", &report, Some(&human))
}

fn ensure_config(root: &Path) -> Result<bool> {
    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::InvalidConfig(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok(false);
    }

    Config::default().save(&config_path)?;
    Ok(true)
}

fn ensure_dir(path: &Path) -> Result<bool> {
    if path.exists() {
        if !path.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "expected directory at {}",
                path.display()
            )));
        }
        return Ok(false);
    }

    std::fs::create_dir_all(path)?;
    Ok(true)
}
