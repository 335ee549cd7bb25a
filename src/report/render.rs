//! Report artifacts: `results.json` and `report.html`.

use std::fs;
use std::path::{Path, PathBuf};

use tera::{Context, Tera};
use tracing::{debug, info, warn};

use super::MatrixSnapshot;
use crate::error::ReportError;

pub const RESULTS_JSON: &str = "results.json";
pub const REPORT_HTML: &str = "report.html";

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>agent-matrix {{ run_id }}</title>
<style>
body { font-family: system-ui, sans-serif; margin: 2rem; color: #1f2328; }
table { border-collapse: collapse; }
th, td { border: 1px solid #d0d7de; padding: 0.5rem; vertical-align: top; text-align: left; }
td.passed { background: #dafbe1; }
td.failed { background: #ffebe9; }
td.running { background: #fff8c5; }
td.pending { color: #656d76; }
td.empty { background: #f6f8fa; }
.state { font-weight: 600; text-transform: uppercase; font-size: 0.8rem; }
.meta { color: #656d76; font-size: 0.8rem; }
.error { color: #cf222e; font-size: 0.8rem; }
ul { margin: 0.25rem 0; padding-left: 1rem; font-size: 0.8rem; }
li.bad { color: #cf222e; }
</style>
</head>
<body>
<h1>Agent matrix</h1>
<p><strong>{{ summary.passed }}/{{ summary.total }} passed</strong>{% if summary.failed > 0 %}, {{ summary.failed }} failed{% endif %}{% if summary.pending > 0 %}, {{ summary.pending }} not run{% endif %}</p>
<p class="meta">Run {{ run_id }} started {{ started_at }}, updated {{ updated_at }}</p>
<table>
<thead>
<tr><th>Model</th><th>Runner</th>{% for column in columns %}<th>{{ column }}</th>{% endfor %}</tr>
</thead>
<tbody>
{% for row in rows %}<tr>
<td>{{ row.model }}</td><td>{{ row.runner }}</td>
{% for cell in row.cells %}{% if cell %}<td class="{{ cell.state }}">
<div class="state">{{ cell.state }}</div>
{% if cell.detail %}{% set d = cell.detail %}<div class="meta">{{ d.duration_secs | round(precision=1) }}s, attempt {{ d.attempt_index }} of {{ d.attempts_run }}, {{ d.rules_passed }}/{{ d.rules_total }} rules</div>
{% if d.transport_error %}<div class="error">{{ d.transport_error }}</div>{% endif %}
<ul>{% for v in d.validations %}<li class="{% if v.passed %}ok{% else %}bad{% endif %}">{{ v.rule }}{% if v.message %}: {{ v.message }}{% endif %}</li>{% endfor %}</ul>
<a href="{{ d.log_path | urlencode }}">log</a>{% endif %}
</td>{% else %}<td class="empty"></td>{% endif %}{% endfor %}
</tr>
{% endfor %}</tbody>
</table>
</body>
</html>
"#;

/// Renders the snapshot as a standalone HTML page.
pub fn render_html(snapshot: &MatrixSnapshot) -> Result<String, ReportError> {
    let context = Context::from_serialize(snapshot)?;
    Ok(Tera::one_off(REPORT_TEMPLATE, &context, true)?)
}

/// Writes report artifacts into a results directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn json_path(&self) -> PathBuf {
        self.dir.join(RESULTS_JSON)
    }

    pub fn html_path(&self) -> PathBuf {
        self.dir.join(REPORT_HTML)
    }

    /// Rewrites both artifacts from the snapshot.
    pub fn write(&self, snapshot: &MatrixSnapshot) -> Result<(), ReportError> {
        fs::create_dir_all(&self.dir).map_err(|source| ReportError::Write {
            path: self.dir.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(snapshot)?;
        write_file(&self.json_path(), &json)?;
        let html = render_html(snapshot)?;
        write_file(&self.html_path(), &html)?;

        debug!(
            "Report updated: {} ({})",
            self.html_path().display(),
            snapshot.summary
        );
        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ReportError> {
    fs::write(path, contents).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Opens the report in the desktop's default viewer. Failures only warn.
pub fn open_report(path: &Path) {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    match std::process::Command::new(opener).arg(path).spawn() {
        Ok(_) => info!("Opened {}", path.display()),
        Err(e) => warn!("Could not open {} with {}: {}", path.display(), opener, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GooseSettings, ModelSpec, RunnerSettings, RunnerSpec};
    use crate::matrix::TestPair;
    use crate::report::ResultMatrix;
    use crate::runner::{Attempt, RepresentativeResult};
    use crate::scenario::Scenario;
    use crate::validation::{ValidationOutcome, ValidationRule};
    use tempfile::TempDir;

    fn matrix() -> ResultMatrix {
        let runner = RunnerSpec::new("goose", RunnerSettings::Goose(GooseSettings::default()), "/s");
        let pairs = vec![
            TestPair {
                scenario: Scenario::new("create-file", "p"),
                model: ModelSpec::new("opus", "anthropic", "claude-opus-4-5"),
                runner: runner.clone(),
            },
            TestPair {
                scenario: Scenario::new("edit-file", "p"),
                model: ModelSpec::new("opus", "anthropic", "claude-opus-4-5"),
                runner,
            },
        ];
        let mut matrix = ResultMatrix::new(&pairs);

        let rule = ValidationRule::FileContains {
            path: "hello.rs".to_string(),
            pattern: "<debug_args>".to_string(),
        };
        let attempt = Attempt::start(2, "logs/create-file_opus_qwen%3A64k/attempt-2.log").complete(
            "agent output",
            vec![ValidationOutcome::fail(&rule, "hello.rs does not contain: <debug_args>")],
        );
        matrix
            .record(RepresentativeResult {
                key: pairs[0].key(),
                attempt,
                attempts_run: 2,
            })
            .unwrap();
        matrix.mark_running(&pairs[1].key()).unwrap();
        matrix
    }

    #[test]
    fn test_render_html() {
        let html = render_html(&matrix().snapshot()).unwrap();
        assert!(html.contains("<th>create-file</th>"));
        assert!(html.contains("<td class=\"failed\">"));
        assert!(html.contains("<td class=\"running\">"));
        assert!(html.contains("0/2 passed"));
        assert!(html.contains("attempt 2 of 2"));
        // rule text is escaped
        assert!(html.contains("&lt;debug_args&gt;"));
        assert!(!html.contains("<debug_args>"));
        // escaped slugs survive the browser decoding the link
        assert!(html.contains("create-file_opus_qwen%253A64k"));
    }

    #[test]
    fn test_writer_creates_both_artifacts() {
        let temp = TempDir::new().unwrap();
        let writer = ReportWriter::new(temp.path().join("results"));
        let snapshot = matrix().snapshot();
        writer.write(&snapshot).unwrap();

        let json: MatrixSnapshot =
            serde_json::from_str(&fs::read_to_string(writer.json_path()).unwrap()).unwrap();
        assert_eq!(json.run_id, snapshot.run_id);
        assert_eq!(json.summary.failed, 1);
        assert!(writer.html_path().is_file());
    }

    #[test]
    fn test_unwritable_results_dir() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("results");
        fs::write(&blocker, "not a directory").unwrap();

        let err = ReportWriter::new(&blocker).write(&matrix().snapshot()).unwrap_err();
        assert!(matches!(err, ReportError::Write { .. }));
    }
}
