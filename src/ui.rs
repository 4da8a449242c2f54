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
use skali_cards::{Card, ElementType, Gallery, GalleryFilter, GalleryStats, SortOrder};
use std::io;

const PAGE_STEP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Gallery,
    Leaderboard,
    Types,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Gallery => Page::Leaderboard,
            Page::Leaderboard => Page::Types,
            Page::Types => Page::Gallery,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Gallery => Page::Types,
            Page::Leaderboard => Page::Gallery,
            Page::Types => Page::Leaderboard,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Gallery => "Galerie",
            Page::Leaderboard => "Classement",
            Page::Types => "Types",
        }
    }
}

pub struct App {
    pub gallery: Gallery,
    pub filtered_cards: Vec<Card>,
    pub leaderboard: Vec<Card>,
    pub state: TableState,
    pub leaderboard_state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub filter: GalleryFilter,
    pub sort: SortOrder,
    stats: GalleryStats,
}

impl App {
    pub fn new(cards: Vec<Card>) -> Self {
        let gallery = Gallery::new(cards);
        let stats = gallery.stats();
        let leaderboard = gallery
            .query(&GalleryFilter::default(), SortOrder::Level)
            .into_iter()
            .cloned()
            .collect();

        let mut leaderboard_state = TableState::default();
        leaderboard_state.select(Some(0));

        let mut app = Self {
            gallery,
            filtered_cards: Vec::new(),
            leaderboard,
            state: TableState::default(),
            leaderboard_state,
            current_page: Page::Gallery,
            show_detail: false,
            filter: GalleryFilter::default(),
            sort: SortOrder::Name,
            stats,
        };
        app.refresh();
        app
    }

    fn refresh(&mut self) {
        self.filtered_cards = self.gallery.query(&self.filter, self.sort).into_iter().cloned().collect();

        // Reset selection to first item
        if !self.filtered_cards.is_empty() {
            self.state.select(Some(0));
        } else {
            self.state.select(None);
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_card(&self) -> Option<&Card> {
        self.state.selected().and_then(|i| self.filtered_cards.get(i))
    }

    /// `None` shows every type
    pub fn apply_type_filter(&mut self, element: Option<ElementType>) {
        self.filter.element = element;
        self.refresh();
    }

    pub fn cycle_sort(&mut self) {
        self.sort = match self.sort {
            SortOrder::Name => SortOrder::Level,
            SortOrder::Level => SortOrder::Recent,
            SortOrder::Recent => SortOrder::Name,
        };
        self.refresh();
    }

    pub fn clear_filter(&mut self) {
        self.filter = GalleryFilter::default();
        self.refresh();
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn stats(&self) -> &GalleryStats {
        &self.stats
    }

    fn active_list(&mut self) -> (usize, &mut TableState) {
        match self.current_page {
            Page::Leaderboard => (self.leaderboard.len(), &mut self.leaderboard_state),
            _ => (self.filtered_cards.len(), &mut self.state),
        }
    }

    pub fn next(&mut self) {
        let (len, state) = self.active_list();
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
        let (len, state) = self.active_list();
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
        let (len, state) = self.active_list();
        if len == 0 {
            return;
        }
        let i = state.selected().map_or(0, |i| (i + PAGE_STEP).min(len - 1));
        state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let (_, state) = self.active_list();
        let i = state.selected().map_or(0, |i| i.saturating_sub(PAGE_STEP));
        state.select(Some(i));
    }

    pub fn first(&mut self) {
        let (len, state) = self.active_list();
        if len > 0 {
            state.select(Some(0));
        }
    }

    pub fn last(&mut self) {
        let (len, state) = self.active_list();
        if len > 0 {
            state.select(Some(len - 1));
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
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

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn type_for_key(c: char) -> Option<Option<ElementType>> {
    match c {
        '0' => Some(None),
        '1'..='6' => {
            let index = c as usize - '1' as usize;
            ElementType::ALL.get(index).map(|e| Some(*e))
        }
        _ => None,
    }
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
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
                KeyCode::Char('c') => {
                    app.clear_filter();
                    app.current_page = Page::Gallery;
                }
                KeyCode::Char('s') => app.cycle_sort(),
                KeyCode::Char(c) if type_for_key(c).is_some() => {
                    if let Some(element) = type_for_key(c) {
                        app.apply_type_filter(element);
                        app.current_page = Page::Gallery;
                    }
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.first(),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Gallery {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Gallery => render_table(f, chunks[1], app),
            Page::Leaderboard => render_leaderboard(f, chunks[1], app),
            Page::Types => render_types(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

/// Terminal color closest to a type's hex color
fn type_color(element: ElementType) -> Color {
    match element {
        ElementType::Fighting => Color::Red,
        ElementType::Electric => Color::Yellow,
        ElementType::Fire => Color::LightRed,
        ElementType::Psychic => Color::Magenta,
        ElementType::Flying => Color::LightBlue,
        ElementType::Normal => Color::Gray,
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let stats = app.stats();

    let mut tab_spans = vec![];
    for (i, page) in [Page::Gallery, Page::Leaderboard, Page::Types].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        tab_spans.push(Span::styled(page.title(), style));
    }

    tab_spans.push(Span::raw("  │  "));
    tab_spans.push(Span::styled(
        format!("🎴 {} cartes", stats.total),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Niv. moyen {:.1}", stats.average_level),
        Style::default().fg(Color::Green),
    ));

    let header = Paragraph::new(Line::from(tab_spans))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn card_row(card: &Card, rank: Option<usize>) -> Row<'static> {
    let display = card.element.display();
    let color = type_color(card.element);

    let mut cells = Vec::new();
    if let Some(rank) = rank {
        cells.push(Cell::from(format!("#{}", rank)));
    }
    cells.extend([
        Cell::from(truncate(&card.full_name(), 26)),
        Cell::from(format!("{:>3}", card.level)),
        Cell::from(format!("{} {}", display.icon, display.name)).style(Style::default().fg(color)),
        Cell::from(card.tier.label()),
        Cell::from(truncate(&card.identity.name, 16)),
    ]);
    Row::new(cells)
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Membre", "Niv.", "Type", "Palier", "Carte"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows: Vec<Row> = app.filtered_cards.iter().map(|card| card_row(card, None)).collect();

    let title = match app.filter.element {
        Some(element) => format!(" Galerie · {} ({}) ", element.display().name, app.filtered_cards.len()),
        None => format!(" Galerie ({}) ", app.filtered_cards.len()),
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(28),
            Constraint::Length(5),
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(18),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::Blue)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▶ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_leaderboard(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Rang", "Membre", "Niv.", "Type", "Palier", "Carte"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells).style(Style::default().bg(Color::DarkGray));

    let rows: Vec<Row> = app
        .leaderboard
        .iter()
        .enumerate()
        .map(|(i, card)| card_row(card, Some(i + 1)))
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(28),
            Constraint::Length(5),
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(18),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Classement par niveau "),
    )
    .highlight_style(Style::default().bg(Color::Blue).add_modifier(Modifier::BOLD))
    .highlight_symbol("▶ ");

    f.render_stateful_widget(table, area, &mut app.leaderboard_state);
}

fn render_types(f: &mut Frame, area: Rect, app: &App) {
    let stats = app.stats();

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![Span::styled(
            "  FILTRER PAR TYPE",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(""),
    ];

    let marker = |active: bool| {
        if active {
            Span::styled("→ ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        } else {
            Span::raw("  ")
        }
    };

    lines.push(Line::from(vec![
        Span::raw("  "),
        marker(app.filter.element.is_none()),
        Span::styled("0", Style::default().fg(Color::Yellow)),
        Span::raw("  Tous les types"),
        Span::styled(format!("  ({})", stats.total), Style::default().fg(Color::DarkGray)),
    ]));

    for (i, element) in ElementType::ALL.iter().enumerate() {
        let display = element.display();
        let count = stats.by_type.get(element).copied().unwrap_or(0);
        lines.push(Line::from(vec![
            Span::raw("  "),
            marker(app.filter.element == Some(*element)),
            Span::styled(format!("{}", i + 1), Style::default().fg(Color::Yellow)),
            Span::raw("  "),
            Span::styled(
                format!("{} {:<10}", display.icon, display.name),
                Style::default().fg(type_color(*element)),
            ),
            Span::styled(format!("({})", count), Style::default().fg(Color::DarkGray)),
            Span::raw("  "),
            Span::styled(display.description, Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![Span::styled(
        "  PALIERS",
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
    )]));
    lines.push(Line::from(""));
    for (tier, count) in &stats.by_tier {
        let (low, high) = tier.level_range();
        lines.push(Line::from(vec![
            Span::raw("    "),
            Span::styled(format!("{:<14}", tier.label()), Style::default().fg(Color::White)),
            Span::styled(format!("niv. {:>3}-{:<3}", low, high), Style::default().fg(Color::DarkGray)),
            Span::raw(format!("  {}", count)),
        ]));
    }

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Types "),
    );

    f.render_widget(panel, area);
}

fn stat_bar(label: &str, value: u8) -> Line<'static> {
    let filled = usize::from(value) / 5;
    Line::from(vec![
        Span::styled(
            format!("  {:<9}", label),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled("█".repeat(filled), Style::default().fg(Color::Green)),
        Span::styled("░".repeat(20 - filled), Style::default().fg(Color::DarkGray)),
        Span::raw(format!(" {:>3}", value)),
    ])
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let Some(card) = app.selected_card() else {
        let empty = Paragraph::new("  Aucune carte sélectionnée").block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(" Carte "),
        );
        f.render_widget(empty, area);
        return;
    };

    let display = card.element.display();
    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let mut content = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(
                format!("  {}", card.full_name()),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
            Span::styled(format!("PV {}", card.hp), Style::default().fg(Color::Red)),
        ]),
        Line::from(vec![
            Span::styled("  Carte: ", label),
            Span::raw(format!("{} #{}", card.identity.name, card.identity.sprite_id)),
        ]),
        Line::from(vec![
            Span::styled("  Type: ", label),
            Span::styled(
                format!("{} {}", display.icon, display.name),
                Style::default().fg(type_color(card.element)),
            ),
        ]),
        Line::from(vec![
            Span::styled("  Palier: ", label),
            Span::raw(format!("{} · {}", card.tier.label(), card.rarity.label())),
        ]),
        Line::from(vec![
            Span::styled("  Badge: ", label),
            Span::raw(format!("{} {}", card.badge.icon, card.badge.name)),
        ]),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        stat_bar("Cardio", card.stats.cardio),
        stat_bar("Force", card.stats.force),
        stat_bar("Gym", card.stats.gym),
        stat_bar("Puissance", card.stats.power),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  ATTAQUES",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
    ];

    for attack in &card.attacks {
        content.push(Line::from(vec![
            Span::raw(format!("  {:<20}", attack.name)),
            Span::styled(format!("{:>4}", attack.damage), Style::default().fg(Color::Red)),
        ]));
    }

    content.push(Line::from(""));
    content.push(Line::from(vec![
        Span::styled("  Performances: ", label),
        Span::raw(format!("{} ({} records)", card.performance_count, card.pr_count)),
    ]));
    if let Some(date) = card.last_performance {
        content.push(Line::from(vec![
            Span::styled("  Dernière: ", label),
            Span::raw(date.format("%d/%m/%Y").to_string()),
        ]));
    }
    content.push(Line::from(""));
    content.push(Line::from(vec![Span::styled(
        "  Entrée pour fermer",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )]));

    let detail_panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Carte "),
    );

    f.render_widget(detail_panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![
        Span::styled(
            format!("{} ", app.current_page.title()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("│ "),
    ];

    if let Some(element) = app.filter.element {
        status_spans.push(Span::styled(
            format!("Filtre: {} ", element.display().name),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" effacer │ "));
    }

    let sort = match app.sort {
        SortOrder::Name => "nom",
        SortOrder::Level => "niveau",
        SortOrder::Recent => "récent",
    };
    status_spans.push(Span::styled("s", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(format!(" tri: {} │ ", sort)));
    status_spans.push(Span::styled("0-6", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" type │ "));
    status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" carte │ "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" page │ "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" │ "));
    status_spans.push(Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" │ "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" quitter"));

    let status = Paragraph::new(Line::from(status_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skali_cards::{CardEngine, Gender, Member, PerformanceRecord, Unit};

    fn app() -> App {
        let members = vec![
            Member::new("1", "Zoé", "Bernard", Gender::Female),
            Member::new("2", "Adam", "Moreau", Gender::Male),
            Member::new("3", "Inès", "Arnaud", Gender::Female),
        ];
        let records: Vec<PerformanceRecord> = (0..6)
            .map(|i| PerformanceRecord::new("2", "Back Squat", 100.0 + i as f64, Unit::Kg, "2024-02-01"))
            .collect();
        App::new(CardEngine::default().regenerate_gallery(&members, &records, None).into_cards())
    }

    #[test]
    fn test_type_filter_and_clear() {
        let mut app = app();
        assert_eq!(app.filtered_cards.len(), 3);

        app.apply_type_filter(Some(ElementType::Fighting));
        assert_eq!(app.filtered_cards.len(), 1);
        assert_eq!(app.selected_card().map(|c| c.member_id.as_str()), Some("2"));

        app.apply_type_filter(Some(ElementType::Psychic));
        assert!(app.filtered_cards.is_empty());
        assert_eq!(app.state.selected(), None);

        app.clear_filter();
        assert_eq!(app.filtered_cards.len(), 3);
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = app();
        app.previous();
        assert_eq!(app.state.selected(), Some(2));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
        app.page_down();
        assert_eq!(app.state.selected(), Some(2));
        app.page_up();
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_type_keys() {
        assert_eq!(type_for_key('0'), Some(None));
        assert_eq!(type_for_key('1'), Some(Some(ElementType::Fighting)));
        assert_eq!(type_for_key('6'), Some(Some(ElementType::Normal)));
        assert_eq!(type_for_key('7'), None);
        assert_eq!(type_for_key('x'), None);
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("Zoé", 10), "Zoé");
        assert_eq!(truncate("Émilie-Charlotte Dupont", 10), "Émilie-...");
    }
}
