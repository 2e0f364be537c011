//! Rendering of per-dataset accuracy summaries.

use std::collections::BTreeMap;

use crate::types::{ScoreSummary, System};

/// Plain aligned table, one row per dataset.
pub fn render_table(results: &BTreeMap<String, ScoreSummary>) -> String {
    let width = results
        .keys()
        .map(String::len)
        .chain(std::iter::once("dataset".len()))
        .max()
        .unwrap_or_default();

    let mut out = format!(
        "{:<width$}  {:>10}  {:>8}  {:>8}  {:>7}\n",
        "dataset", "under_test", "baseline", "examples", "skipped"
    );
    for (name, summary) in results {
        out.push_str(&format!(
            "{:<width$}  {:>10.2}  {:>8.2}  {:>8}  {:>7}\n",
            name,
            summary.accuracy(System::UnderTest),
            summary.accuracy(System::Baseline),
            summary.examples,
            summary.skipped,
        ));
    }
    out
}

/// LaTeX `tabular` with datasets as rows and systems as columns.
pub fn render_latex(results: &BTreeMap<String, ScoreSummary>) -> String {
    let header: Vec<String> = System::ALL.iter().map(|s| latex_escape(s.as_str())).collect();

    let mut out = String::from("\\begin{tabular}{| l | c | c |}\n\\toprule\n");
    out.push_str(&format!("{{}} & {} \\\\\n", header.join(" & ")));
    out.push_str("\\midrule\n");
    for (name, summary) in results {
        let cells: Vec<String> = System::ALL
            .iter()
            .map(|&s| format!("{:.2}", summary.accuracy(s)))
            .collect();
        out.push_str(&format!("{} & {} \\\\\n", latex_escape(name), cells.join(" & ")));
    }
    out.push_str("\\bottomrule\n\\end{tabular}\n");
    out
}

fn latex_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '_' | '&' | '%' | '$' | '#' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
