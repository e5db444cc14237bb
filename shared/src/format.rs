//! Locale formatting helpers (pt-BR).
//!
//! Pure functions, no state. Everything user-facing in the app renders
//! through these: currency as Brazilian Real, dates as day/month/year,
//! month names in Portuguese.

use chrono::NaiveDate;

const MONTH_NAMES: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

/// Format an amount as Brazilian Real: `R$ 1.234,56`.
///
/// Negative amounts carry the sign before the symbol (`-R$ 10,00`).
/// Non-finite amounts render as zero rather than panicking.
pub fn format_currency(value: f64) -> String {
    let negative = value.is_sign_negative() && value != 0.0;
    // `as` saturates, so NaN becomes 0 and infinities clamp
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-R$ {},{:02}", grouped, frac)
    } else {
        format!("R$ {},{:02}", grouped, frac)
    }
}

/// Format a date as `dd/mm/yyyy`.
pub fn format_date(date: &NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Portuguese name for a zero-based month index (0 = Janeiro).
pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month as usize)
        .copied()
        .unwrap_or("Mês inválido")
}
