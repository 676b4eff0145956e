use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row as TableRow, Table, TableState},
};

use crate::domain::HELP_TEXT;
use crate::model::{DetailData, Model, UIData, View};
use crate::row::EventKind;

pub const STATUSLINE_HEIGHT: usize = 1;
// Top and bottom border plus the header line.
pub const TABLE_CHROME_HEIGHT: usize = 3;
pub const MAX_COLUMN_WIDTH: usize = 40;
const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

const ADDED: Style = Style::new().fg(Color::Green);
const CHANGED: Style = Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD);
const DELETED: Style = Style::new().fg(Color::DarkGray);

#[derive(Debug, Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let data = model.get_uidata();
        let [main, statusline] = Layout::vertical([
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        match (&data.view, &data.detail) {
            (View::Detail(_), Some(detail)) => self.draw_detail(detail, frame, main),
            _ => self.draw_table(data, frame, main),
        }
        self.draw_statusline(data, frame, statusline);

        if data.show_help {
            self.draw_help(frame, main);
        }
    }

    fn draw_table(&mut self, data: &UIData, frame: &mut Frame, area: Rect) {
        let header = TableRow::new(data.header.iter().map(|c| {
            let mut name = c.name.clone();
            if c.name == data.sort_column.name {
                name.push(if data.sort_column.asc { '↑' } else { '↓' });
            }
            Cell::from(name)
        }))
        .style(Style::new().bold());

        let rows = data.rows.iter().map(|evt| {
            let cells = evt.row.fields.iter().enumerate().map(|(i, value)| {
                let style = match evt.kind {
                    EventKind::Add => ADDED,
                    EventKind::Update if evt.deltas.get(i).is_some() => CHANGED,
                    EventKind::Delete => DELETED,
                    _ => Style::new(),
                };
                Cell::from(Span::styled(value.clone(), style))
            });
            TableRow::new(cells)
        });

        let title = Line::from(vec![
            " ".into(),
            data.name.clone().bold(),
            format!("({}) ", namespace_label(&data.namespace)).into(),
        ]);
        let table = Table::new(rows, column_widths(data))
            .header(header)
            .block(
                Block::bordered()
                    .title(title.centered())
                    .border_set(border::PLAIN),
            )
            .row_highlight_style(Style::new().add_modifier(Modifier::REVERSED));

        self.table_state.select(data.selected_row);
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn draw_detail(&self, detail: &DetailData, frame: &mut Frame, area: Rect) {
        let block = Block::bordered()
            .title(Line::from(format!(" {} ", detail.id).bold()).centered())
            .border_set(border::PLAIN);

        let Some(evt) = &detail.event else {
            let text = Paragraph::new(format!("{} is gone", detail.id))
                .centered()
                .block(block);
            frame.render_widget(text, area);
            return;
        };

        let rows = detail.header.iter().enumerate().map(|(i, column)| {
            let value = evt.row.fields.get(i).cloned().unwrap_or_default();
            let (style, previous) = match evt.deltas.get(i) {
                Some(old) => (CHANGED, old.to_string()),
                None => (Style::new(), String::new()),
            };
            let name = if column.attrs.wide {
                format!("{} (wide)", column.name)
            } else {
                column.name.clone()
            };
            TableRow::new(vec![
                Cell::from(name.bold()),
                Cell::from(Span::styled(value, style)),
                Cell::from(Span::styled(previous, DELETED)),
            ])
        });

        let table = Table::new(
            rows,
            [
                Constraint::Length(MAX_COLUMN_WIDTH as u16 / 2),
                Constraint::Fill(2),
                Constraint::Fill(1),
            ],
        )
        .header(TableRow::new(["FIELD", "VALUE", "PREVIOUS"]).style(Style::new().bold()))
        .block(block);
        frame.render_widget(table, area);
    }

    fn draw_statusline(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans: Vec<Span> = vec![
            format!(" {} ", data.name).black().on_cyan(),
            format!(" {} ", namespace_label(&data.namespace)).into(),
            format!("{}/{} ", data.rows.len(), data.total).into(),
        ];
        if data.sort_column.is_active() {
            let dir = if data.sort_column.asc { "asc" } else { "desc" };
            let manual = if data.manual_sort { "*" } else { "" };
            spans.push(format!("sort:{}:{dir}{manual} ", data.sort_column.name).into());
        }
        if data.wide {
            spans.push("wide ".yellow());
        }
        if !data.filter.is_empty() {
            spans.push(format!("/{} ", data.filter).blue());
        }
        if data.last_status_message_update.elapsed() < STATUS_MESSAGE_TIMEOUT {
            spans.push(data.status_message.clone().italic());
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_help(&self, frame: &mut Frame, area: Rect) {
        let height = HELP_TEXT.lines().count() as u16 + 2;
        let [popup] = Layout::vertical([Constraint::Length(height)])
            .flex(Flex::Center)
            .areas(area);
        let [popup] = Layout::horizontal([Constraint::Length(48)])
            .flex(Flex::Center)
            .areas(popup);

        let help = Paragraph::new(HELP_TEXT).block(
            Block::bordered()
                .title(Line::from(" Help ".bold()).centered())
                .title_bottom(Line::from(" <Esc> close ").centered())
                .border_set(border::THICK),
        );
        frame.render_widget(Clear, popup);
        frame.render_widget(help, popup);
    }
}

fn namespace_label(namespace: &str) -> &str {
    if namespace.is_empty() { "all" } else { namespace }
}

/// Widest cell per column, capped. Leaves room for the sort indicator.
fn column_widths(data: &UIData) -> Vec<Constraint> {
    let mut widths: Vec<usize> = data
        .header
        .iter()
        .map(|c| c.name.chars().count() + 1)
        .collect();
    for evt in &data.rows {
        for (w, value) in widths.iter_mut().zip(&evt.row.fields) {
            *w = (*w).max(value.chars().count());
        }
    }
    widths
        .into_iter()
        .map(|w| Constraint::Length(w.min(MAX_COLUMN_WIDTH) as u16))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RTVConfig;
    use crate::header::{Header, HeaderColumn};
    use crate::row::{Row, RowEvent};
    use ratatui::{Terminal, backend::TestBackend};

    #[test]
    fn widths_follow_content() {
        let mut data = UIData::empty();
        data.header = Header(vec![HeaderColumn::new("NAME"), HeaderColumn::new("IP")]);
        data.rows = vec![RowEvent::new(
            EventKind::Add,
            Row::new("a", ["a", "9".repeat(80).as_str()]),
        )];
        assert_eq!(
            column_widths(&data),
            [Constraint::Length(5), Constraint::Length(MAX_COLUMN_WIDTH as u16)]
        );
    }

    #[test]
    fn renders_table_and_statusline() {
        let model = Model::init(&RTVConfig::default(), 10);
        let mut ui = TableUI::new();
        let mut terminal = Terminal::new(TestBackend::new(60, 10)).unwrap();
        terminal.draw(|f| ui.draw(&model, f)).unwrap();

        let buffer = terminal.backend().buffer();
        let last_line: String = (0..60)
            .map(|x| buffer[(x, 9)].symbol().to_string())
            .collect();
        assert!(last_line.contains("all"), "{last_line}");
        assert!(last_line.contains("0/0"), "{last_line}");
    }
}
