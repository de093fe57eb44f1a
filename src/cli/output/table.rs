//! Table output formatting using comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::{BookOutcome, Category, Recommendation};
use crate::services::convergence::BookReport;

/// Table formatter for CLI output.
pub struct TableFormatter {
    use_colors: bool,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Format ledger entries, highest category first.
    pub fn format_recommendations(&self, recommendations: &[&Recommendation]) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Category").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Sources").add_attribute(Attribute::Bold),
            Cell::new("Books").add_attribute(Attribute::Bold),
        ]);

        let mut sorted: Vec<&Recommendation> = recommendations.to_vec();
        sorted.sort_by(|a, b| b.category.cmp(&a.category).then(a.title.cmp(&b.title)));

        for rec in sorted {
            let category_cell = if self.use_colors {
                Cell::new(rec.category.label()).fg(category_color(rec.category))
            } else {
                Cell::new(rec.category.label())
            };
            table.add_row(vec![
                category_cell,
                Cell::new(truncate_text(&rec.title, 60)),
                Cell::new(rec.source_books.len()),
                Cell::new(truncate_text(&rec.source_books.join(", "), 50)),
            ]);
        }
        table.to_string()
    }

    /// Format per-book run results.
    pub fn format_book_reports(&self, reports: &[BookReport]) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Book").add_attribute(Attribute::Bold),
            Cell::new("Outcome").add_attribute(Attribute::Bold),
            Cell::new("Iterations").add_attribute(Attribute::Bold),
            Cell::new("New").add_attribute(Attribute::Bold),
            Cell::new("Merged").add_attribute(Attribute::Bold),
            Cell::new("Suppressed").add_attribute(Attribute::Bold),
        ]);

        for report in reports {
            let outcome_cell = if self.use_colors {
                Cell::new(outcome_label(&report.outcome)).fg(outcome_color(&report.outcome))
            } else {
                Cell::new(outcome_label(&report.outcome))
            };
            table.add_row(vec![
                Cell::new(truncate_text(&report.book, 50)),
                outcome_cell,
                Cell::new(report.iterations),
                Cell::new(report.new),
                Cell::new(report.duplicate + report.improved),
                Cell::new(report.suppressed),
            ]);
        }
        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn category_color(category: Category) -> Color {
    match category {
        Category::Critical => Color::Red,
        Category::Important => Color::Yellow,
        Category::NiceToHave => Color::Green,
    }
}

fn outcome_label(outcome: &BookOutcome) -> &'static str {
    match outcome {
        BookOutcome::Running => "running",
        BookOutcome::Converged => "converged",
        BookOutcome::Exhausted => "exhausted",
        BookOutcome::Errored => "errored",
        BookOutcome::Interrupted => "interrupted",
    }
}

fn outcome_color(outcome: &BookOutcome) -> Color {
    match outcome {
        BookOutcome::Converged => Color::Green,
        BookOutcome::Exhausted | BookOutcome::Interrupted => Color::Yellow,
        BookOutcome::Errored => Color::Red,
        BookOutcome::Running => Color::White,
    }
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err() && std::env::var("TERM").map_or(false, |t| t != "dumb")
}
