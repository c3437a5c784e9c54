mod support;

use std::process::Command;
use std::sync::{Arc, Barrier};
use std::thread;

use assert_cmd::cargo::cargo_bin;
use hive::config::Config;
use hive::error::Error;
use hive::{Actor, Hive};
use tempfile::TempDir;

use support::{alice, hive_json, memory_hive, project, task};

#[test]
fn parallel_starts_leave_one_running_timer() {
    let hive = Arc::new(memory_hive());
    let p = project(&hive, "Site");
    let tasks: Vec<String> = (0..8).map(|i| task(&hive, &p, &format!("t{i}")).id).collect();
    let barrier = Arc::new(Barrier::new(tasks.len()));

    let handles: Vec<_> = tasks
        .iter()
        .cloned()
        .map(|task_id| {
            let hive = Arc::clone(&hive);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                hive.timer().start(&task_id, &alice(), "race")
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("join thread").expect("start");
    }

    let entries = hive.timer().entries_for_user("u-alice");
    assert_eq!(entries.len(), tasks.len());
    assert_eq!(entries.iter().filter(|entry| entry.is_running).count(), 1);
    assert!(entries
        .iter()
        .filter(|entry| !entry.is_running)
        .all(|entry| entry.end_time.is_some() && entry.duration.is_some()));
}

#[test]
fn opposing_dependencies_cannot_both_land() {
    for _ in 0..20 {
        let hive = Arc::new(memory_hive());
        let p = project(&hive, "Site");
        let a = task(&hive, &p, "A").id;
        let b = task(&hive, &p, "B").id;
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [(a.clone(), b.clone()), (b.clone(), a.clone())]
            .into_iter()
            .map(|(from, to)| {
                let hive = Arc::clone(&hive);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    hive.tasks().add_dependency(&from, &to, &alice())
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("join thread"))
            .collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(Error::CycleDetected { .. }))));

        let edges = hive.tasks().get(&a).expect("a").depends_on.len()
            + hive.tasks().get(&b).expect("b").depends_on.len();
        assert_eq!(edges, 1);
    }
}

#[test]
fn parallel_comments_all_reach_the_log() {
    let hive = Arc::new(memory_hive());
    let p = project(&hive, "Site");
    let t = task(&hive, &p, "Landing page").id;
    let writers = 6;
    let per_writer = 20;
    let barrier = Arc::new(Barrier::new(writers));

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let hive = Arc::clone(&hive);
            let barrier = Arc::clone(&barrier);
            let task_id = t.clone();
            thread::spawn(move || {
                let actor = Actor::new(format!("u-{w}"), format!("Writer {w}"));
                barrier.wait();
                for i in 0..per_writer {
                    hive.comments()
                        .add(&task_id, &actor, &format!("note {i}"))
                        .expect("comment");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("join thread");
    }

    assert_eq!(hive.comments().list_for_task(&t).len(), writers * per_writer);
    // project + task + comments
    assert_eq!(hive.log().len(), 2 + writers * per_writer);
    assert_eq!(hive.sync_notifications().expect("sync"), 2 + writers * per_writer);
}

#[test]
fn parallel_processes_share_one_data_dir() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let root = dir.path().to_path_buf();
    let project = hive_json(&root, "alice", &["project", "new", "Site"]);
    let project_id = project["id"].as_str().ok_or("project id")?.to_string();
    let task = hive_json(&root, "alice", &["task", "new", &project_id, "Landing page"]);
    let task_id = task["id"].as_str().ok_or("task id")?.to_string();

    let count = 4;
    let bin = Arc::new(cargo_bin("hive"));
    let handles: Vec<_> = (0..count)
        .map(|idx| {
            let bin = Arc::clone(&bin);
            let root = root.clone();
            let task_id = task_id.clone();
            thread::spawn(move || {
                Command::new(bin.as_ref())
                    .env_remove("HIVE_DIR")
                    .arg("--dir")
                    .arg(&root)
                    .arg("--user")
                    .arg(format!("user-{idx}"))
                    .args(["comment", "add", task_id.as_str(), format!("from {idx}").as_str()])
                    .status()
            })
        })
        .collect();
    for handle in handles {
        let status = handle.join().expect("join thread")?;
        assert!(status.success());
    }

    let hive = Hive::open(&root, Config::default())?;
    assert_eq!(hive.comments().list_for_task(&task_id).len(), count);
    assert_eq!(hive.log().for_task(&task_id, 100).len(), count + 1);
    Ok(())
}

#[test]
fn separate_handles_see_each_others_writes() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let first = Hive::open(dir.path(), Config::default())?;
    let p = project(&first, "Site");
    let a = task(&first, &p, "A").id;
    let b = task(&first, &p, "B").id;

    // Opened before either edge exists; its snapshot has no dependencies.
    let second = Hive::open(dir.path(), Config::default())?;

    first.tasks().add_dependency(&a, &b, &alice())?;
    let err = second
        .tasks()
        .add_dependency(&b, &a, &alice())
        .expect_err("closing the loop from a stale handle");
    assert!(matches!(err, Error::CycleDetected { .. }));

    first.timer().start(&a, &alice(), "first handle")?;
    second.timer().start(&b, &alice(), "second handle")?;

    let reopened = Hive::open(dir.path(), Config::default())?;
    let edges = reopened.tasks().get(&a)?.depends_on.len() + reopened.tasks().get(&b)?.depends_on.len();
    assert_eq!(edges, 1);
    let entries = reopened.timer().entries_for_user("u-alice");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries.iter().filter(|entry| entry.is_running).count(), 1);
    assert_eq!(
        reopened.timer().running_entry_for("u-alice").map(|entry| entry.task_id),
        Some(b)
    );
    Ok(())
}

#[test]
fn racing_handles_keep_invariants_on_disk() -> Result<(), Box<dyn std::error::Error>> {
    for _ in 0..10 {
        let dir = TempDir::new()?;
        let (a, b) = {
            let setup = Hive::open(dir.path(), Config::default())?;
            let p = project(&setup, "Site");
            (task(&setup, &p, "A").id, task(&setup, &p, "B").id)
        };
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [(a.clone(), b.clone()), (b.clone(), a.clone())]
            .into_iter()
            .map(|(from, to)| {
                let root = dir.path().to_path_buf();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || -> hive::Result<bool> {
                    let hive = Hive::open(&root, Config::default())?;
                    barrier.wait();
                    hive.timer().start(&from, &alice(), "race")?;
                    match hive.tasks().add_dependency(&from, &to, &alice()) {
                        Ok(_) => Ok(true),
                        Err(Error::CycleDetected { .. }) => Ok(false),
                        Err(err) => Err(err),
                    }
                })
            })
            .collect();
        let mut landed = 0;
        for handle in handles {
            if handle.join().expect("join thread")? {
                landed += 1;
            }
        }
        assert_eq!(landed, 1);

        let reopened = Hive::open(dir.path(), Config::default())?;
        let edges = reopened.tasks().get(&a)?.depends_on.len() + reopened.tasks().get(&b)?.depends_on.len();
        assert_eq!(edges, 1);
        let running = reopened
            .timer()
            .entries_for_user("u-alice")
            .into_iter()
            .filter(|entry| entry.is_running)
            .count();
        assert_eq!(running, 1);
    }
    Ok(())
}
