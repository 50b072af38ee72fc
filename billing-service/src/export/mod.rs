//! Static HTML invoice documents.
//!
//! All amounts are rounded to two decimal places here, and only here.

use metering_core::domain::Invoice;
use rust_decimal::Decimal;
use time::format_description::well_known::Rfc3339;

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn currency_symbol(currency: &str) -> String {
    match currency {
        "INR" => "₹".to_string(),
        "USD" => "$".to_string(),
        "EUR" => "€".to_string(),
        other => format!("{} ", escape_html(other)),
    }
}

/// `amount` rounded half away from zero to 2 places, always showing both decimals.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

fn format_money(symbol: &str, amount: Decimal) -> String {
    format!("{symbol}{}", format_amount(amount))
}

fn format_percent(rate: Decimal) -> String {
    (rate * Decimal::ONE_HUNDRED).normalize().to_string()
}

pub fn render_invoice_html(invoice: &Invoice) -> String {
    let bill = &invoice.bill;
    let b = &bill.breakdown;
    let symbol = currency_symbol(&b.currency);
    let issued = invoice
        .issued_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| invoice.issued_at.date().to_string());

    let mut slab_rows = String::new();
    for c in &b.slab_charges {
        slab_rows.push_str(&format!(
            "        <tr>\n            <td>{}</td>\n            <td>{}</td>\n            <td>{}</td>\n            <td>{}</td>\n        </tr>\n",
            escape_html(&c.slab),
            format_amount(c.units),
            format_amount(c.rate),
            format_money(&symbol, c.charge),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Invoice {invoice_id}</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        h1 {{ text-align: center; }}
        table {{ width: 100%; border-collapse: collapse; margin: 20px 0; }}
        th, td {{ border: 1px solid #ddd; padding: 10px; text-align: left; }}
        th {{ background-color: #f2f2f2; }}
        .total {{ font-weight: bold; font-size: 1.2em; }}
    </style>
</head>
<body>
    <h1>Smart Energy Meter Invoice</h1>
    <p><strong>Invoice:</strong> {invoice_id}</p>
    <p><strong>Device ID:</strong> {device_id}</p>
    <p><strong>Month:</strong> {month}</p>
    <p><strong>Issued:</strong> {issued}</p>
    <p><strong>Due:</strong> {due}</p>
    <p><strong>Status:</strong> {status}</p>

    <h2>Consumption</h2>
    <p><strong>Total Energy:</strong> {energy} kWh</p>

    <h2>Charges</h2>
    <table>
        <tr>
            <th>Slab Range</th>
            <th>Units</th>
            <th>Rate ({symbol}/unit)</th>
            <th>Charge ({symbol})</th>
        </tr>
{slab_rows}    </table>

    <h2>Bill Summary</h2>
    <table>
        <tr>
            <td>Subtotal:</td>
            <td>{subtotal}</td>
        </tr>
        <tr>
            <td>Fixed Charge:</td>
            <td>{fixed}</td>
        </tr>
        <tr>
            <td>Tax ({tax_pct}%):</td>
            <td>{tax}</td>
        </tr>
        <tr class="total">
            <td>Total Amount Due:</td>
            <td>{total}</td>
        </tr>
    </table>
</body>
</html>
"#,
        invoice_id = escape_html(&invoice.invoice_id),
        device_id = escape_html(&bill.device_id),
        month = bill.month,
        issued = issued,
        due = invoice.due_date,
        status = invoice.status,
        energy = format_amount(b.energy_total),
        symbol = symbol,
        slab_rows = slab_rows,
        subtotal = format_money(&symbol, b.subtotal),
        fixed = format_money(&symbol, b.fixed_charge),
        tax_pct = format_percent(b.tax_rate),
        tax = format_money(&symbol, b.tax),
        total = format_money(&symbol, b.total),
    )
}
