//! `merchwatch parse` — run the pure interpreters on one input.
//!
//! Debugging aid: feed a scraped text fragment straight to the sales,
//! date, or revenue logic and see what the pipeline would make of it.

use crate::cli::output;
use crate::parse::{dates, revenue, sales};
use crate::record::{Units, UNKNOWN};
use anyhow::Result;

/// `parse sales <text> [--funded TEXT]`
pub async fn run_sales(sales_text: &str, funded: Option<&str>) -> Result<()> {
    let (units, rate) = sales::interpret(sales_text, funded.unwrap_or(UNKNOWN));

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "unitsSold": units,
            "fundedRate": rate,
        }));
        return Ok(());
    }
    println!("  units sold:  {units}");
    println!("  funded rate: {rate}");
    Ok(())
}

/// `parse date <text>`
pub async fn run_date(text: &str) -> Result<()> {
    let normalized = dates::normalize(text);

    if output::is_json() {
        output::print_json(&serde_json::json!({ "normalized": normalized }));
        return Ok(());
    }
    println!("  normalized: {normalized}");
    Ok(())
}

/// `parse revenue <units> <category> [--price TEXT]`
pub async fn run_revenue(units_text: &str, category: &str, price: Option<&str>) -> Result<()> {
    let prices = revenue::CategoryPrices::builtin();
    let units = Units::from_text(units_text);
    let resolved = revenue::resolve_price(price, category, &prices);
    let value = revenue::estimate(units, category, price, &prices);

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "unitsSold": units,
            "price": resolved,
            "revenue": value,
        }));
        return Ok(());
    }
    println!("  units:   {units} (effective {})", units.effective_quantity());
    println!("  price:   {resolved:.2}");
    println!("  revenue: {value:.2}");
    Ok(())
}
