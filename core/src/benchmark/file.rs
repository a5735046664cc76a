use crate::agent::RunResult;
use crate::benchmark::SessionSummary;
use crate::task::Task;
use crate::traits::BenchmarkAdapter;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reads tasks from a local file and writes one result file per task.
///
/// The task file is either a JSON array of tasks or JSON Lines with one task
/// per line. Results land in `<results_dir>/<task_id>.json`, and a full run
/// also writes `<results_dir>/session.json` with the summary.
pub struct FileBenchmark {
    tasks_path: PathBuf,
    results_dir: PathBuf,
}

impl FileBenchmark {
    pub fn new(tasks_path: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            tasks_path: tasks_path.into(),
            results_dir: results_dir.into(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn result_path(&self, task_id: &str) -> PathBuf {
        self.results_dir.join(format!("{}.json", sanitize_file_stem(task_id)))
    }

    pub fn session_path(&self) -> PathBuf {
        self.results_dir.join("session.json")
    }

    async fn write_json(&self, path: &Path, value: &impl serde::Serialize) -> Result<()> {
        tokio::fs::create_dir_all(&self.results_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create results directory {}",
                    self.results_dir.display()
                )
            })?;

        let body = serde_json::to_string_pretty(value)?;
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

pub fn parse_tasks(content: &str) -> Result<Vec<Task>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("Failed to parse task array");
    }

    let mut tasks = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let task: Task = serde_json::from_str(line)
            .with_context(|| format!("Failed to parse task on line {}", i + 1))?;
        tasks.push(task);
    }
    Ok(tasks)
}

fn sanitize_file_stem(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl BenchmarkAdapter for FileBenchmark {
    async fn tasks(&self) -> Result<Vec<Task>> {
        let content = tokio::fs::read_to_string(&self.tasks_path)
            .await
            .with_context(|| format!("Failed to read tasks from {}", self.tasks_path.display()))?;

        let tasks = parse_tasks(&content)
            .with_context(|| format!("Invalid task file {}", self.tasks_path.display()))?;
        info!(count = tasks.len(), path = %self.tasks_path.display(), "Loaded tasks");
        Ok(tasks)
    }

    async fn submit(&self, task: &Task, result: &RunResult) -> Result<()> {
        let path = self.result_path(&task.id);
        self.write_json(&path, result).await?;

        debug!(task = %task.id, path = %path.display(), "Result written");
        Ok(())
    }

    async fn finish_session(&self, summary: &SessionSummary) -> Result<()> {
        let path = self.session_path();
        self.write_json(&path, summary).await?;

        info!(path = %path.display(), "Session summary written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentLoop, ToolRegistry};
    use crate::testing::ScriptedProvider;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn parses_array_and_jsonl() {
        let array = r#"[{"id": "a", "text": "one"}, {"id": "b", "text": "two"}]"#;
        let tasks = parse_tasks(array).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].id, "b");

        let lines = "{\"id\": \"a\", \"text\": \"one\"}\n\n{\"id\": \"b\", \"text\": \"two\", \"answer_schema\": {\"type\": \"string\"}}\n";
        let tasks = parse_tasks(lines).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].answer_schema, Some(json!({"type": "string"})));
    }

    #[test]
    fn bad_line_is_reported_by_number() {
        let err = parse_tasks("{\"id\": \"a\", \"text\": \"one\"}\n{oops}\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn result_file_names_are_safe() {
        let bench = FileBenchmark::new("tasks.json", "/tmp/out");
        assert_eq!(bench.results_dir(), Path::new("/tmp/out"));
        assert_eq!(
            bench.result_path("erc/001 a"),
            PathBuf::from("/tmp/out/erc_001_a.json")
        );
    }

    #[tokio::test]
    async fn loads_tasks_and_writes_results() {
        let tmp = TempDir::new().unwrap();
        let tasks_path = tmp.path().join("tasks.jsonl");
        std::fs::write(&tasks_path, "{\"id\": \"t1\", \"text\": \"say hi\"}\n").unwrap();
        let bench = FileBenchmark::new(&tasks_path, tmp.path().join("results"));

        let tasks = bench.tasks().await.unwrap();
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"reasoning": "easy", "is_done": true, "final_answer": "hi"}"#,
        ]));
        let agent = AgentLoop::new(provider, Arc::new(ToolRegistry::new()));
        let result = agent.run(tasks[0].clone()).await;

        bench.submit(&tasks[0], &result).await.unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(bench.result_path("t1")).unwrap())
                .unwrap();
        assert_eq!(written["task_id"], "t1");
        assert_eq!(written["outcome"]["status"], "done");
        assert_eq!(written["outcome"]["answer"], "hi");
    }

    #[tokio::test]
    async fn finish_session_writes_summary() {
        let tmp = TempDir::new().unwrap();
        let bench = FileBenchmark::new("tasks.json", tmp.path().join("results"));
        let summary = SessionSummary {
            passed: 2,
            failed: 0,
            failures: Vec::new(),
        };

        bench.finish_session(&summary).await.unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(bench.session_path()).unwrap()).unwrap();
        assert_eq!(written, json!({"passed": 2, "failed": 0, "failures": []}));
    }

    #[tokio::test]
    async fn missing_task_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let bench = FileBenchmark::new(tmp.path().join("absent.json"), tmp.path());
        let err = bench.tasks().await.unwrap_err();
        assert!(err.to_string().contains("Failed to read tasks"));
    }
}
