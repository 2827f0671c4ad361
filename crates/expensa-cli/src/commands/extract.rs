//! Extract command - pull receipt fields out of recognized text.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use chrono::Utc;
use clap::Args;
use console::style;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use expensa_core::{ExpenseDraft, ExtractedFields, ReceiptFieldExtractor};

use super::load_config;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Recognized receipt text, or "-" to read stdin
    #[arg(required = true)]
    input: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also show the expense draft the fields would seed
    #[arg(long)]
    draft: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

#[derive(Serialize)]
struct ExtractOutput<'a> {
    fields: &'a ExtractedFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    draft: Option<ExpenseDraft>,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let text = read_input(&args.input)?;

    info!("Extracting fields from {} characters", text.len());
    let extractor = ReceiptFieldExtractor::from_config(&config.extraction);
    let fields = extractor.extract(&text);

    let draft = args.draft.then(|| {
        ExpenseDraft::from_extracted(
            &fields,
            config.extraction.default_currency.clone(),
            Utc::now().date_naive(),
        )
    });

    let output = match args.format {
        OutputFormat::Json => {
            if draft.is_some() {
                serde_json::to_string_pretty(&ExtractOutput {
                    fields: &fields,
                    draft,
                })?
            } else {
                serde_json::to_string_pretty(&fields)?
            }
        }
        OutputFormat::Text => format_text(&fields, draft.as_ref()),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    Ok(())
}

fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }

    let path = PathBuf::from(input);
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    Ok(fs::read_to_string(&path)?)
}

fn format_text(fields: &ExtractedFields, draft: Option<&ExpenseDraft>) -> String {
    let missing = || style("not found").dim().to_string();
    let amount = |value: Option<Decimal>| value.map(|v| format!("{:.2}", v)).unwrap_or_else(missing);

    let mut out = String::new();
    out.push_str(&format!(
        "Merchant:  {}\n",
        fields.merchant_name.clone().unwrap_or_else(missing)
    ));
    out.push_str(&format!(
        "Date:      {}\n",
        fields.date.map(|d| d.to_string()).unwrap_or_else(missing)
    ));
    out.push_str(&format!("Subtotal:  {}\n", amount(fields.subtotal)));
    out.push_str(&format!("Tax:       {}\n", amount(fields.tax)));
    out.push_str(&format!("Total:     {}\n", amount(fields.total)));

    match fields.cross_check(Decimal::new(1, 2)) {
        Some(true) => out.push_str(&format!(
            "{} Subtotal + tax matches total\n",
            style("✓").green()
        )),
        Some(false) => out.push_str(&format!(
            "{} Subtotal + tax does not match total\n",
            style("⚠").yellow()
        )),
        None => {}
    }

    if let Some(draft) = draft {
        out.push_str(&format!(
            "\nDraft:     {} {} on {}\n",
            if draft.merchant_name.is_empty() {
                "(no merchant)"
            } else {
                draft.merchant_name.as_str()
            },
            draft.amount,
            draft.expense_date
        ));
    }

    out
}
