use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::canvas::Course;
use crate::ledger::tmp_path;

#[derive(Debug, Serialize, Deserialize)]
struct CourseSelection {
    selected_course_ids: Vec<String>,
    selected_course_names: HashMap<String, String>,
    last_updated: String,
}

/// Load the selected course ids. `None` means no config exists (or it is
/// unreadable) and every active course is monitored.
pub fn load(path: &Path) -> Option<Vec<String>> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(
                "Could not read {}: {e} - monitoring all courses",
                path.display()
            );
            return None;
        }
    };
    match serde_json::from_str::<CourseSelection>(&content) {
        Ok(selection) => Some(selection.selected_course_ids),
        Err(e) => {
            tracing::warn!(
                "Could not parse {}: {e} - monitoring all courses",
                path.display()
            );
            None
        }
    }
}

pub fn save(course_ids: &[String], courses: &[Course], path: &Path) -> Result<()> {
    let id_to_name: HashMap<&str, &str> = courses
        .iter()
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect();
    let selection = CourseSelection {
        selected_course_ids: course_ids.to_vec(),
        selected_course_names: course_ids
            .iter()
            .map(|id| {
                let name = id_to_name.get(id.as_str()).copied().unwrap_or("Unknown");
                (id.clone(), name.to_string())
            })
            .collect(),
        last_updated: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    };

    let json = serde_json::to_string_pretty(&selection)?;
    let tmp = tmp_path(path);
    std::fs::write(&tmp, &json)?;
    std::fs::rename(&tmp, path)?;
    tracing::info!(
        "Saved {} with {} selected courses",
        path.display(),
        course_ids.len()
    );
    Ok(())
}

/// Interactive one-time course selection. Prints the active courses, reads a
/// comma-separated index list (or `all`) from stdin, confirms, and saves.
pub fn run_setup(courses: &[Course], path: &Path) -> Result<()> {
    println!("\nAvailable courses:");
    for (i, course) in courses.iter().enumerate() {
        println!("  {:2}. {}", i + 1, course.name);
    }
    println!("\nEnter course numbers to monitor (comma-separated), or 'all' for all courses:");

    let stdin = std::io::stdin();
    let selected: Vec<&Course> = loop {
        eprint!("> ");
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            anyhow::bail!("stdin closed during setup");
        }
        let raw = line.trim();
        if raw.is_empty() {
            println!("Please enter at least one course number or 'all'.");
            continue;
        }
        if raw.eq_ignore_ascii_case("all") {
            break courses.iter().collect();
        }
        match parse_indices(raw, courses.len()) {
            Ok(indices) => break indices.into_iter().map(|i| &courses[i - 1]).collect(),
            Err(msg) => println!("{msg}"),
        }
    };

    println!("\nSelected courses:");
    for course in &selected {
        println!("  - {}", course.name);
    }

    eprint!("\nConfirm? [y/n]: ");
    let mut line = String::new();
    stdin.read_line(&mut line)?;
    if !line.trim().eq_ignore_ascii_case("y") {
        println!("Setup cancelled.");
        return Ok(());
    }

    let ids: Vec<String> = selected.iter().map(|c| c.id.clone()).collect();
    save(&ids, courses, path)?;
    println!(
        "\nSaved. Commit {} to apply on the next scheduled run.",
        path.display()
    );
    Ok(())
}

fn parse_indices(raw: &str, max: usize) -> Result<Vec<usize>, String> {
    let mut indices = Vec::new();
    for part in raw.split(',') {
        let n: usize = part
            .trim()
            .parse()
            .map_err(|_| "Invalid input. Enter numbers separated by commas, or 'all'.".to_string())?;
        if n < 1 || n > max {
            return Err(format!("Please enter numbers between 1 and {max}."));
        }
        indices.push(n);
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: &str, name: &str) -> Course {
        Course {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_parse_indices() {
        assert_eq!(parse_indices("1, 3,2", 3).unwrap(), vec![1, 3, 2]);
        assert!(parse_indices("0", 3).is_err());
        assert!(parse_indices("4", 3).is_err());
        assert!(parse_indices("one", 3).is_err());
        assert!(parse_indices("1,,2", 3).is_err());
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("courses_config.json")).is_none());
    }

    #[test]
    fn test_load_corrupt_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses_config.json");
        std::fs::write(&path, "{oops").unwrap();
        assert!(load(&path).is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses_config.json");
        let courses = [course("1", "CS101"), course("2", "MA202")];

        save(&["2".to_string()], &courses, &path).unwrap();
        assert_eq!(load(&path), Some(vec!["2".to_string()]));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["selected_course_names"]["2"], "MA202");
        assert!(raw["last_updated"].is_string());
    }
}
