use crate::config::ExportSettings;
use crate::types::{Digest, DigestError, ExportFormat, PriceQuote, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

const SUMMARY_HEADING: &str = "## Summary\n\n";

/// Writes digests to dated Markdown/PDF files in one directory.
pub struct Exporter {
    directory: PathBuf,
    pdf_converter: String,
    tz: Tz,
}

/// What [`parse_markdown`] recovers from an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExport {
    pub title: String,
    pub summary: String,
    pub prices: Vec<PriceQuote>,
}

impl Exporter {
    pub fn new(directory: impl Into<PathBuf>, tz: Tz) -> Self {
        Self {
            directory: directory.into(),
            pdf_converter: "pandoc".to_string(),
            tz,
        }
    }

    pub fn from_settings(settings: &ExportSettings, tz: Tz) -> Self {
        Self::new(settings.directory.clone(), tz).with_pdf_converter(&settings.pdf_converter)
    }

    /// Converter command line; the Markdown path, `-o` and the PDF path are appended.
    pub fn with_pdf_converter(mut self, command: &str) -> Self {
        self.pdf_converter = command.to_string();
        self
    }

    fn run_date(&self, digest: &Digest) -> NaiveDate {
        digest.generated_at.with_timezone(&self.tz).date_naive()
    }

    pub fn path_for(&self, date: NaiveDate, extension: &str) -> PathBuf {
        self.directory
            .join(format!("stock_summary_{}.{}", date.format("%Y-%m-%d"), extension))
    }

    /// Export in the requested format(s) and return the files written.
    ///
    /// PDF export always writes the Markdown file first since it is the
    /// converter's input.
    pub async fn export(&self, digest: &Digest, format: ExportFormat) -> Result<Vec<PathBuf>> {
        let markdown_path = self.write_markdown(digest).await?;
        let mut written = Vec::new();
        if format.wants_markdown() {
            written.push(markdown_path.clone());
        }
        if format.wants_pdf() {
            written.push(self.write_pdf(&markdown_path, self.run_date(digest)).await?);
        }
        Ok(written)
    }

    pub async fn write_markdown(&self, digest: &Digest) -> Result<PathBuf> {
        let path = self.path_for(self.run_date(digest), "md");
        let content = render_markdown(digest);

        fs::create_dir_all(&self.directory).await.map_err(|e| {
            DigestError::Export(format!("Cannot create {}: {}", self.directory.display(), e))
        })?;

        let tmp = temp_path(&path);
        fs::write(&tmp, content.as_bytes())
            .await
            .map_err(|e| DigestError::Export(format!("Cannot write {}: {}", tmp.display(), e)))?;
        replace(&tmp, &path).await?;

        info!("Exported Markdown digest to {}", path.display());
        Ok(path)
    }

    async fn write_pdf(&self, markdown_path: &Path, date: NaiveDate) -> Result<PathBuf> {
        let path = self.path_for(date, "pdf");
        let tmp = self.directory.join(format!(".stock_summary_{}.tmp.pdf", date.format("%Y-%m-%d")));

        let mut parts = self.pdf_converter.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| DigestError::Export("No PDF converter configured".to_string()))?;

        debug!("Converting {} with {}", markdown_path.display(), program);
        let output = Command::new(program)
            .args(parts)
            .arg(markdown_path)
            .arg("-o")
            .arg(&tmp)
            .output()
            .await
            .map_err(|e| DigestError::Export(format!("Cannot run PDF converter '{}': {}", program, e)))?;

        if !output.status.success() {
            let _ = fs::remove_file(&tmp).await;
            return Err(DigestError::Export(format!(
                "PDF converter exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        replace(&tmp, &path).await?;

        info!("Exported PDF digest to {}", path.display());
        Ok(path)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

/// Whole-file replace: readers see the old file or the new one, never a mix.
async fn replace(tmp: &Path, path: &Path) -> Result<()> {
    if let Err(e) = fs::rename(tmp, path).await {
        warn!("Rename into {} failed: {}", path.display(), e);
        let _ = fs::remove_file(tmp).await;
        return Err(DigestError::Export(format!("Cannot replace {}: {}", path.display(), e)));
    }
    Ok(())
}

pub fn render_markdown(digest: &Digest) -> String {
    let mut md = format!("# {}\n\n", digest.title);
    let _ = write!(
        md,
        "*Generated {} from {} articles*\n\n",
        digest.generated_at.format("%Y-%m-%d %H:%M UTC"),
        digest.article_count
    );

    if !digest.prices.is_empty() {
        md.push_str("## Current Stock Prices\n\n");
        md.push_str("| Ticker | Price | Change | % Change | Volume | Trading Day |\n");
        md.push_str("|--------|-------|--------|----------|--------|-------------|\n");
        // Plain `{}` keeps the shortest exact f64 form so the table parses back losslessly.
        for quote in &digest.prices {
            let volume = quote.volume.map_or_else(|| "-".to_string(), |v| v.to_string());
            let _ = writeln!(
                md,
                "| {} | ${} | {:+} | {:+}% | {} | {} |",
                quote.ticker,
                quote.price,
                quote.change,
                quote.percent_change,
                volume,
                quote.trading_day.as_deref().unwrap_or("-")
            );
        }
        md.push('\n');
    }

    if let Some(sentiment) = &digest.sentiment {
        let mentioned: Vec<_> = sentiment.iter().filter(|(_, counts)| counts.total() > 0).collect();
        if !mentioned.is_empty() {
            md.push_str("## Market Sentiment\n\n");
            for (ticker, counts) in mentioned {
                let _ = write!(
                    md,
                    "### {}\n\n- Positive mentions: {}\n- Negative mentions: {}\n- Neutral mentions: {}\n\n",
                    ticker, counts.positive, counts.negative, counts.neutral
                );
            }
        }
    }

    md.push_str(SUMMARY_HEADING);
    md.push_str(&digest.summary);
    md
}

/// Read a Markdown export back into its title, summary and price rows.
pub fn parse_markdown(content: &str) -> Result<ParsedExport> {
    let title = content
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("# "))
        .ok_or_else(|| DigestError::Parse("Export does not start with a title".to_string()))?
        .to_string();

    let summary_at = content
        .find(&format!("\n{}", SUMMARY_HEADING))
        .ok_or_else(|| DigestError::Parse("Export has no summary section".to_string()))?;
    let header = &content[..summary_at];
    let summary = content[summary_at + 1 + SUMMARY_HEADING.len()..].to_string();

    let mut prices = Vec::new();
    let mut in_prices = false;
    for line in header.lines() {
        if line.starts_with("## ") {
            in_prices = line == "## Current Stock Prices";
            continue;
        }
        if !in_prices || !line.starts_with('|') || line.starts_with("| Ticker") || line.starts_with("|-") {
            continue;
        }
        prices.push(parse_price_row(line)?);
    }

    Ok(ParsedExport { title, summary, prices })
}

fn parse_price_row(line: &str) -> Result<PriceQuote> {
    let cells: Vec<&str> = line.trim_matches('|').split('|').map(str::trim).collect();
    let [ticker, price, change, percent, volume, day] = cells[..] else {
        return Err(DigestError::Parse(format!("Malformed price row: {}", line)));
    };
    let number = |raw: &str| {
        raw.trim_start_matches('$')
            .trim_end_matches('%')
            .parse::<f64>()
            .map_err(|e| DigestError::Parse(format!("Bad number '{}' in price row: {}", raw, e)))
    };
    Ok(PriceQuote {
        ticker: ticker.to_string(),
        price: number(price)?,
        change: number(change)?,
        percent_change: number(percent)?,
        volume: match volume {
            "-" => None,
            raw => Some(
                raw.parse()
                    .map_err(|e| DigestError::Parse(format!("Bad volume '{}' in price row: {}", raw, e)))?,
            ),
        },
        trading_day: (day != "-").then(|| day.to_string()),
    })
}
