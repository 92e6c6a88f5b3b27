//! Console rendering of emitted transactions

use std::io::Write;

use colored::*;
use tipwatch_core::{Height, Input, Output, Transaction};
use tipwatch_scanner::{EmittedBlock, Presenter};

const NANOERG_PER_ERG: u64 = 1_000_000_000;

/// Something the console knows how to draw
pub enum Renderable<'a> {
    Transaction(&'a Transaction),
    Input(&'a Input),
    Output(&'a Output),
}

impl Renderable<'_> {
    pub fn render(&self) -> String {
        match self {
            Renderable::Transaction(tx) => render_transaction(tx),
            Renderable::Input(input) => {
                format!("  {} {}", "in ".red().bold(), input.box_id.red())
            }
            Renderable::Output(output) => {
                let mut line = format!(
                    "  {} {} {}",
                    "out".green().bold(),
                    output.box_id.green(),
                    format_erg(output.value).yellow()
                );
                if !output.assets.is_empty() {
                    line.push_str(&format!(" [{} tokens]", output.assets.len()).magenta().to_string());
                }
                line
            }
        }
    }
}

fn render_transaction(tx: &Transaction) -> String {
    let mut lines = vec![format!(
        "{} {}",
        "Transaction".cyan().bold(),
        tx.id.bright_white().bold()
    )];

    let mut details = format!(
        "  {} inputs, {} outputs, {} total",
        tx.inputs.len(),
        tx.outputs.len(),
        format_erg(tx.total_output_value())
    );
    if !tx.data_inputs.is_empty() {
        details.push_str(&format!(", {} data inputs", tx.data_inputs.len()));
    }
    if let Some(size) = tx.size {
        details.push_str(&format!(", {} bytes", size));
    }
    lines.push(details.dimmed().to_string());

    lines.extend(tx.inputs.iter().map(|i| Renderable::Input(i).render()));
    lines.extend(tx.outputs.iter().map(|o| Renderable::Output(o).render()));
    lines.join("\n")
}

/// Format a nanoERG amount as ERG with full precision
pub fn format_erg(nano: u64) -> String {
    format!("{}.{:09} ERG", nano / NANOERG_PER_ERG, nano % NANOERG_PER_ERG)
}

/// Writes each block and its transactions to a terminal or any writer
pub struct ConsolePresenter<W> {
    out: W,
}

impl ConsolePresenter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsolePresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            tracing::warn!(error = %e, "Failed to write to console");
        }
    }
}

impl<W: Write + Send> Presenter for ConsolePresenter<W> {
    fn present(&mut self, _height: Height, transaction: &Transaction) {
        let text = Renderable::Transaction(transaction).render();
        self.emit(&text);
    }

    fn present_block(&mut self, block: &EmittedBlock) {
        let banner = format!(
            "Block {} at height {} ({} transactions)",
            block.header_id(),
            block.height,
            block.transactions().len()
        );
        self.emit(&banner.bright_blue().bold().to_string());

        for transaction in block.transactions() {
            self.present(block.height, transaction);
        }
        if let Err(e) = self.out.flush() {
            tracing::warn!(error = %e, "Failed to flush console");
        }
    }
}
