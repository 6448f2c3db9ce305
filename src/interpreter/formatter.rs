// 💬 Response Formatter
// ParsedCommand / ParseFailure → reply text, plus currency rendering
//
// Formatting never fails. A command that cannot be rendered on its own
// (balance, report and dashboard need stored data) falls back to the
// generic error template.

use crate::config::{CurrencyFormat, InterpreterConfig, MessageTemplates, PeriodToken, UsageHint};
use crate::error::ParseFailure;
use crate::interpreter::{Intent, Interpretation, ParsedCommand, Period};

/// Render an amount as "Rp 1.000.000": rounded to whole units, digits grouped
/// in threes. Negative amounts keep their sign after the symbol.
pub fn format_currency(currency: &CurrencyFormat, amount: f64) -> String {
    if !amount.is_finite() {
        return format!("{}{}{}", currency.symbol, currency.symbol_separator, amount);
    }

    let digits = format!("{:.0}", amount.abs());
    let grouped = group_digits(&digits, &currency.thousands_separator);
    let sign = if amount < 0.0 && digits != "0" { "-" } else { "" };

    format!("{}{}{}{}", currency.symbol, currency.symbol_separator, sign, grouped)
}

fn group_digits(digits: &str, separator: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3 * separator.len());

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(ch);
    }

    out
}

/// Replace each `{name}` placeholder with its value
fn render(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{}}}", name), value)
    })
}

pub struct ResponseFormatter {
    currency: CurrencyFormat,
    messages: MessageTemplates,
    usage: Vec<UsageHint>,
    periods: Vec<PeriodToken>,
}

impl ResponseFormatter {
    pub fn new(config: &InterpreterConfig) -> Self {
        ResponseFormatter {
            currency: config.currency.clone(),
            messages: config.messages.clone(),
            usage: config.usage.clone(),
            periods: config.periods.clone(),
        }
    }

    pub fn format_currency(&self, amount: f64) -> String {
        format_currency(&self.currency, amount)
    }

    /// Locale word for a period ("bulan"); falls back to the English name
    pub fn period_word(&self, period: Period) -> String {
        self.periods
            .iter()
            .find(|t| t.period == period)
            .map(|t| t.token.trim().to_string())
            .unwrap_or_else(|| period.as_str().to_string())
    }

    pub fn format_interpretation(&self, interpretation: &Interpretation) -> String {
        match &interpretation.outcome {
            Ok(command) => self.format_command(command),
            Err(failure) => self.format_failure(failure),
        }
    }

    pub fn format_command(&self, command: &ParsedCommand) -> String {
        match command {
            ParsedCommand::Expense { amount, category, .. } if amount.is_finite() => render(
                &self.messages.expense_recorded,
                &[("amount", &self.format_currency(*amount)), ("category", category)],
            ),
            ParsedCommand::Income { amount, category, .. } if amount.is_finite() => render(
                &self.messages.income_recorded,
                &[("amount", &self.format_currency(*amount)), ("category", category)],
            ),
            ParsedCommand::Budget {
                amount,
                period,
                category,
                ..
            } if amount.is_finite() => {
                let amount = self.format_currency(*amount);
                let period = self.period_word(*period);
                match category {
                    Some(category) => render(
                        &self.messages.category_budget_set,
                        &[("amount", &amount), ("category", category), ("period", &period)],
                    ),
                    None => render(
                        &self.messages.budget_set,
                        &[("amount", &amount), ("period", &period)],
                    ),
                }
            }
            ParsedCommand::Help => self.help(),
            _ => self.generic_error(),
        }
    }

    pub fn format_failure(&self, failure: &ParseFailure) -> String {
        let template = match failure {
            ParseFailure::UnrecognizedIntent => return self.unknown(),
            ParseFailure::MissingAmount(_) => &self.messages.missing_amount,
            ParseFailure::MissingCategory(_) => &self.messages.missing_category,
            ParseFailure::MissingPeriod => &self.messages.missing_period,
        };

        match self.usage_for(failure.intent()) {
            Some(hint) => render(
                template,
                &[("subject", &hint.subject), ("example", &hint.example)],
            ),
            None => self.generic_error(),
        }
    }

    pub fn format_balance(&self, income: f64, expenses: f64, balance: f64) -> String {
        render(
            &self.messages.balance,
            &[
                ("income", &self.format_currency(income)),
                ("expenses", &self.format_currency(expenses)),
                ("balance", &self.format_currency(balance)),
            ],
        )
    }

    /// Totals block followed by one line per expense category
    pub fn format_report(
        &self,
        period: Period,
        income: f64,
        expenses: f64,
        by_category: &[(String, f64)],
    ) -> String {
        let mut text = render(
            &self.messages.report,
            &[
                ("period", &self.period_word(period)),
                ("income", &self.format_currency(income)),
                ("expenses", &self.format_currency(expenses)),
                ("net", &self.format_currency(income - expenses)),
            ],
        );

        if by_category.is_empty() && income == 0.0 && expenses == 0.0 {
            text.push('\n');
            text.push_str(&self.messages.report_empty);
            return text;
        }

        for (category, amount) in by_category {
            text.push('\n');
            text.push_str(&render(
                &self.messages.report_line,
                &[("category", category), ("amount", &self.format_currency(*amount))],
            ));
        }

        text
    }

    pub fn format_dashboard(&self, url: &str) -> String {
        render(&self.messages.dashboard, &[("url", url)])
    }

    pub fn format_budget_alert(&self, message: &str) -> String {
        render(&self.messages.budget_alert, &[("message", message)])
    }

    pub fn help(&self) -> String {
        self.messages.help.clone()
    }

    pub fn unknown(&self) -> String {
        self.messages.unknown.clone()
    }

    pub fn generic_error(&self) -> String {
        self.messages.generic_error.clone()
    }

    fn usage_for(&self, intent: Intent) -> Option<&UsageHint> {
        self.usage.iter().find(|hint| hint.intent == intent)
    }
}
