use crate::config::CurrencyFormat;
use crate::db::{self, LedgerEntry, TransactionType, User};
use crate::finance::{self, Balance, BudgetStatus, Insight, InsightKind};
use crate::interpreter::format_currency;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use rusqlite::Connection;
use std::io;

/// Rows loaded into the ledger view
const LEDGER_LIMIT: i64 = 500;
const PAGE_JUMP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Ledger,
    Budgets,
    Insights,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Ledger => Page::Budgets,
            Page::Budgets => Page::Insights,
            Page::Insights => Page::Ledger,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Ledger => Page::Insights,
            Page::Budgets => Page::Ledger,
            Page::Insights => Page::Budgets,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Ledger => "Ledger",
            Page::Budgets => "Budgets",
            Page::Insights => "Insights",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerFilter {
    All,
    Expenses,
    Income,
    Category(String),
}

impl LedgerFilter {
    fn matches(&self, entry: &LedgerEntry) -> bool {
        match self {
            LedgerFilter::All => true,
            LedgerFilter::Expenses => entry.transaction_type == TransactionType::Expense,
            LedgerFilter::Income => entry.transaction_type == TransactionType::Income,
            LedgerFilter::Category(category) => &entry.category == category,
        }
    }

    fn label(&self) -> &str {
        match self {
            LedgerFilter::All => "ALL",
            LedgerFilter::Expenses => "EXPENSE",
            LedgerFilter::Income => "INCOME",
            LedgerFilter::Category(category) => category.as_str(),
        }
    }
}

pub struct DashboardApp {
    pub user: User,
    pub entries: Vec<LedgerEntry>,
    pub filtered: Vec<LedgerEntry>,
    pub state: TableState,
    pub budget_state: TableState,
    pub current_page: Page,
    pub filter: LedgerFilter,
    pub show_detail: bool,
    pub balance: Balance,
    pub budgets: Vec<BudgetStatus>,
    pub insights: Vec<Insight>,
    pub currency: CurrencyFormat,
}

impl DashboardApp {
    pub fn new(
        user: User,
        entries: Vec<LedgerEntry>,
        balance: Balance,
        budgets: Vec<BudgetStatus>,
        insights: Vec<Insight>,
    ) -> Self {
        let mut state = TableState::default();
        if !entries.is_empty() {
            state.select(Some(0));
        }

        let mut budget_state = TableState::default();
        if !budgets.is_empty() {
            budget_state.select(Some(0));
        }

        Self {
            user,
            filtered: entries.clone(),
            entries,
            state,
            budget_state,
            current_page: Page::Ledger,
            filter: LedgerFilter::All,
            show_detail: false,
            balance,
            budgets,
            insights,
            currency: CurrencyFormat::default(),
        }
    }

    /// Snapshot of one user's data
    pub fn load(conn: &Connection, user: User) -> Result<Self> {
        let entries = db::get_user_transactions(conn, user.id, LEDGER_LIMIT, 0)?;
        let balance = finance::get_balance(conn, user.id)?;
        let budgets = finance::check_budget_status(conn, user.id)?;
        let insights = finance::get_financial_insights(conn, user.id)?;

        Ok(Self::new(user, entries, balance, budgets, insights))
    }

    pub fn with_currency(mut self, currency: CurrencyFormat) -> Self {
        self.currency = currency;
        self
    }

    pub fn money(&self, amount: f64) -> String {
        format_currency(&self.currency, amount)
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_entry(&self) -> Option<&LedgerEntry> {
        self.state.selected().and_then(|i| self.filtered.get(i))
    }

    pub fn apply_filter(&mut self, filter: LedgerFilter) {
        self.filtered = self
            .entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        self.filter = filter;

        // Reset selection to first item
        if self.filtered.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    pub fn clear_filter(&mut self) {
        self.apply_filter(LedgerFilter::All);
    }

    /// Filter the ledger to the category of the selected row
    pub fn filter_selected_category(&mut self) {
        if let Some(category) = self.selected_entry().map(|e| e.category.clone()) {
            self.apply_filter(LedgerFilter::Category(category));
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn active_state(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::Budgets => (&mut self.budget_state, self.budgets.len()),
            _ => (&mut self.state, self.filtered.len()),
        }
    }

    pub fn next(&mut self) {
        let (state, len) = self.active_state();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (state, len) = self.active_state();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let (state, len) = self.active_state();
        if len == 0 {
            return;
        }
        let i = state.selected().map(|i| (i + PAGE_JUMP).min(len - 1)).unwrap_or(0);
        state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let (state, len) = self.active_state();
        if len == 0 {
            return;
        }
        let i = state.selected().map(|i| i.saturating_sub(PAGE_JUMP)).unwrap_or(0);
        state.select(Some(i));
    }

    /// Expense totals per category over the loaded rows, largest first
    pub fn expense_by_category(&self) -> Vec<(String, f64)> {
        let mut totals: Vec<(String, f64)> = Vec::new();

        for entry in self
            .entries
            .iter()
            .filter(|e| e.transaction_type == TransactionType::Expense)
        {
            match totals.iter_mut().find(|(c, _)| c == &entry.category) {
                Some((_, total)) => *total += entry.amount,
                None => totals.push((entry.category.clone(), entry.amount)),
            }
        }

        totals.sort_by(|a, b| b.1.total_cmp(&a.1));
        totals
    }

    pub fn counts(&self) -> (usize, usize) {
        let expenses = self
            .entries
            .iter()
            .filter(|e| e.transaction_type == TransactionType::Expense)
            .count();
        (expenses, self.entries.len() - expenses)
    }
}

pub fn run_ui(app: &mut DashboardApp) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut DashboardApp,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('1') => {
                    app.apply_filter(LedgerFilter::All);
                    app.current_page = Page::Ledger;
                }
                KeyCode::Char('2') => {
                    app.apply_filter(LedgerFilter::Expenses);
                    app.current_page = Page::Ledger;
                }
                KeyCode::Char('3') => {
                    app.apply_filter(LedgerFilter::Income);
                    app.current_page = Page::Ledger;
                }
                KeyCode::Char('f') if app.current_page == Page::Ledger => {
                    app.filter_selected_category()
                }
                KeyCode::Char('c') => {
                    app.clear_filter();
                    app.current_page = Page::Ledger;
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut DashboardApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Ledger if app.show_detail => {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);

            render_ledger(f, content_chunks[0], app);
            render_detail_panel(f, content_chunks[1], app);
        }
        Page::Ledger => render_ledger(f, chunks[1], app),
        Page::Budgets => render_budgets(f, chunks[1], app),
        Page::Insights => render_insights(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn type_color(kind: TransactionType) -> Color {
    match kind {
        TransactionType::Expense => Color::Red,
        TransactionType::Income => Color::Green,
    }
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_header(f: &mut Frame, area: Rect, app: &DashboardApp) {
    let (expense_count, income_count) = app.counts();

    let mut tab_spans = vec![];
    for (i, page) in [Page::Ledger, Page::Budgets, Page::Insights].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        app.user.phone_number.clone(),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  Saldo "));
    tab_spans.push(Span::styled(
        app.money(app.balance.current_balance),
        Style::default().fg(if app.balance.current_balance < 0.0 {
            Color::Red
        } else {
            Color::Green
        }),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(format!("↓ {}", expense_count), Style::default().fg(Color::Red)));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(format!("↑ {}", income_count), Style::default().fg(Color::Green)));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_ledger(f: &mut Frame, area: Rect, app: &mut DashboardApp) {
    let rows: Vec<Row> = app
        .filtered
        .iter()
        .map(|entry| {
            let color = type_color(entry.transaction_type);
            Row::new(vec![
                Cell::from(entry.date.format("%Y-%m-%d %H:%M").to_string()),
                Cell::from(entry.transaction_type.to_string()).style(Style::default().fg(color)),
                Cell::from(truncate(&entry.category, 20)),
                Cell::from(app.money(entry.amount)).style(Style::default().fg(color)),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(9),
            Constraint::Length(22),
            Constraint::Length(20),
        ],
    )
    .header(header_row(&["Date", "Type", "Category", "Amount"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Transactions "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_budgets(f: &mut Frame, area: Rect, app: &mut DashboardApp) {
    let rows: Vec<Row> = app
        .budgets
        .iter()
        .map(|status| {
            let color = if status.percentage_used >= finance::BUDGET_ALERT_THRESHOLD * 100.0 {
                Color::Red
            } else {
                Color::Green
            };
            Row::new(vec![
                Cell::from(truncate(&status.category, 20)),
                Cell::from(status.period.to_string()),
                Cell::from(app.money(status.budget_amount)),
                Cell::from(app.money(status.spent_amount)),
                Cell::from(format!("{:.1}%", status.percentage_used)).style(Style::default().fg(color)),
                Cell::from(status.period_end.format("%Y-%m-%d").to_string()),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(22),
            Constraint::Length(8),
            Constraint::Length(18),
            Constraint::Length(18),
            Constraint::Length(8),
            Constraint::Length(12),
        ],
    )
    .header(header_row(&["Category", "Period", "Budget", "Spent", "Used", "Ends"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Budgets "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.budget_state);
}

fn render_insights(f: &mut Frame, area: Rect, app: &DashboardApp) {
    let mut content = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Insights",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    for insight in &app.insights {
        let (marker, color) = match insight.kind {
            InsightKind::Warning => ("!", Color::Red),
            InsightKind::Alert => ("⚠", Color::Yellow),
            InsightKind::Tip => ("•", Color::Green),
        };
        content.push(Line::from(vec![
            Span::styled(format!("  {} ", marker), Style::default().fg(color)),
            Span::raw(insight.message.clone()),
        ]));
    }

    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        "  Spending by category",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )));
    content.push(Line::from(""));

    for (category, total) in app.expense_by_category() {
        content.push(Line::from(vec![
            Span::raw(format!("  {:<22}", truncate(&category, 20))),
            Span::styled(app.money(total), Style::default().fg(Color::Red)),
        ]));
    }

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Insights "),
    );

    f.render_widget(paragraph, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &DashboardApp) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Transaction Details ");

    let entry = match app.selected_entry() {
        Some(entry) => entry,
        None => {
            f.render_widget(Paragraph::new("No transaction selected").block(block), area);
            return;
        }
    };

    let label = |text: &'static str| {
        Span::styled(text, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
    };

    let content = vec![
        Line::from(""),
        Line::from(vec![label("  Date: "), Span::raw(entry.date.to_rfc3339())]),
        Line::from(""),
        Line::from(vec![
            label("  Type: "),
            Span::styled(
                entry.transaction_type.to_string(),
                Style::default().fg(type_color(entry.transaction_type)),
            ),
        ]),
        Line::from(""),
        Line::from(vec![label("  Amount: "), Span::raw(app.money(entry.amount))]),
        Line::from(""),
        Line::from(vec![label("  Category: "), Span::raw(entry.category.clone())]),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        Line::from(Span::styled(
            "  MESSAGE",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )),
        Line::from(""),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(
                wrap_text(entry.description.as_deref().unwrap_or("-"), 35),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ),
        ]),
    ];

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &DashboardApp) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, app.filtered.len()),
        Style::default().fg(Color::Cyan),
    )];

    if app.filter != LedgerFilter::All {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("Filter: {}", app.filter.label()),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear)"));
    }

    for (key, action) in [
        ("1/2/3", " All/Out/In"),
        ("f", " Category"),
        ("Enter", " Details"),
        ("Tab", " Page"),
        ("↑/↓", " Nav"),
    ] {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(action));
    }
    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn wrap_text(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if !current_line.is_empty() && current_line.chars().count() + word.chars().count() + 1 > width {
            lines.push(std::mem::take(&mut current_line));
        }
        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines.join("\n  ")
}
