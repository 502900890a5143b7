//! Prompts drawn in an inline terminal viewport.
//!
//! Each prompt opens its own short-lived session: raw mode plus a few lines
//! below the cursor. The session is torn down before the prompt returns, so
//! anything printed between prompts lands in the normal scrollback.

use std::io::{self, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, Once, PoisonError};

use async_trait::async_trait;
use crossterm::event::{
    self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use crossterm::{
    cursor::Show,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame, Terminal, TerminalOptions, Viewport,
};
use tui_textarea::{CursorMove, TextArea};

use super::{
    ChoiceItem, ChoicePrompt, EditorHost, HostError, LiveValidator, PromptEvent, PromptHost, ResultAction,
    ResultView, TextPrompt,
};

const TEXT_HEIGHT: u16 = 6;
const RESULT_HEIGHT: u16 = 6;
const MAX_CHOICE_HEIGHT: u16 = 14;

/// What a key press means to an open prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Accept,
    Back,
    Dismiss,
    Up,
    Down,
    Edit,
}

/// Enter accepts, Esc dismisses, Ctrl+B or Alt+Left go back when offered
fn classify_key(key: &KeyEvent, show_back: bool) -> KeyAction {
    let back = (key.code == KeyCode::Char('b') && key.modifiers.contains(KeyModifiers::CONTROL))
        || (key.code == KeyCode::Left && key.modifiers.contains(KeyModifiers::ALT));
    match key.code {
        _ if back && show_back => KeyAction::Back,
        _ if back => KeyAction::Edit,
        KeyCode::Enter => KeyAction::Accept,
        KeyCode::Esc => KeyAction::Dismiss,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyAction::Dismiss,
        KeyCode::Up => KeyAction::Up,
        KeyCode::Down => KeyAction::Down,
        _ => KeyAction::Edit,
    }
}

/// `Title (2/3)`; the counter is left out for single-step flows
fn progress_title(title: &str, step: usize, total: usize) -> String {
    if total > 1 {
        format!(" {} ({}/{}) ", title, step, total)
    } else {
        format!(" {} ", title)
    }
}

/// Indices of items whose label or description contains `filter`
/// (case-insensitive)
fn filter_items(items: &[ChoiceItem], filter: &str) -> Vec<usize> {
    let needle = filter.to_lowercase();
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| {
            needle.is_empty()
                || item.label.to_lowercase().contains(&needle)
                || item
                    .description
                    .as_ref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
        })
        .map(|(i, _)| i)
        .collect()
}

fn footer(show_back: bool, accept: &str) -> Line<'static> {
    let mut spans = vec![
        Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!(" {}  ", accept)),
        Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" dismiss"),
    ];
    if show_back {
        spans.push(Span::raw("  "));
        spans.push(Span::styled("Ctrl+B", Style::default().add_modifier(Modifier::BOLD)));
        spans.push(Span::raw(" back"));
    }
    Line::from(spans).style(Style::default().fg(Color::DarkGray))
}

/// Set while a session owns the terminal
static SESSION_OPEN: AtomicBool = AtomicBool::new(false);
static PANIC_HOOK: Once = Once::new();

/// Raw mode and an inline viewport, restored on drop
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn open(height: u16) -> io::Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnableFocusChange)?;
        let terminal = Terminal::with_options(
            CrosstermBackend::new(io::stdout()),
            TerminalOptions {
                viewport: Viewport::Inline(height),
            },
        )?;
        SESSION_OPEN.store(true, Ordering::SeqCst);
        Ok(Self { terminal })
    }

    /// Restore the terminal (also used by the panic hook)
    fn cleanup() {
        let _ = execute!(io::stdout(), DisableFocusChange);
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), Show);
        let _ = io::stdout().flush();
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if SESSION_OPEN.swap(false, Ordering::SeqCst) {
            let _ = self.terminal.clear();
            Self::cleanup();
        }
    }
}

/// Restores the terminal if a prompt session is open; true when it was
fn restore_open_session() -> bool {
    if SESSION_OPEN.swap(false, Ordering::SeqCst) {
        TerminalSession::cleanup();
        true
    } else {
        false
    }
}

/// Install a panic hook that restores the terminal before the panic is
/// printed. Later calls are no-ops; returns whether this call installed it.
pub fn install_panic_hook() -> bool {
    let mut installed = false;
    PANIC_HOOK.call_once(|| {
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            restore_open_session();
            original_hook(panic_info);
        }));
        installed = true;
    });
    installed
}

/// Next key press, or `None` when focus was lost and that dismisses
fn next_key(ignore_focus_out: bool) -> io::Result<Option<KeyEvent>> {
    loop {
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => return Ok(Some(key)),
            Event::FocusLost if !ignore_focus_out => return Ok(None),
            _ => {}
        }
    }
}

fn render_text(frame: &mut Frame, prompt: &TextPrompt, textarea: &TextArea, diagnostic: Option<&str>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(progress_title(&prompt.title, prompt.step, prompt.total_steps));
    let inner = block.inner(frame.area());
    frame.render_widget(block, frame.area());

    let [label, input, message, keys] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(inner);

    frame.render_widget(Paragraph::new(prompt.prompt.as_str()), label);
    frame.render_widget(textarea, input);
    if let Some(diagnostic) = diagnostic {
        frame.render_widget(
            Paragraph::new(diagnostic).style(Style::default().fg(Color::Red)),
            message,
        );
    }
    frame.render_widget(Paragraph::new(footer(prompt.show_back, "accept")), keys);
}

fn render_choice(
    frame: &mut Frame,
    prompt: &ChoicePrompt,
    visible: &[usize],
    filter: &str,
    state: &mut ListState,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(progress_title(&prompt.title, prompt.step, prompt.total_steps));
    let inner = block.inner(frame.area());
    frame.render_widget(block, frame.area());

    let [query, list, keys] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(inner);

    let query_line = if filter.is_empty() {
        Line::from(Span::styled(
            prompt.placeholder.clone(),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(format!("> {}", filter))
    };
    frame.render_widget(Paragraph::new(query_line), query);

    let items: Vec<ListItem> = visible
        .iter()
        .filter_map(|i| prompt.items.get(*i))
        .map(|item| {
            let mut spans = vec![Span::raw(item.label.clone())];
            if let Some(description) = &item.description {
                spans.push(Span::styled(
                    format!("  {}", description),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();
    let list_widget = List::new(items)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list_widget, list, state);
    frame.render_widget(Paragraph::new(footer(prompt.show_back, "select")), keys);
}

fn render_result(frame: &mut Frame, view: &ResultView) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", view.title));
    let inner = block.inner(frame.area());
    frame.render_widget(block, frame.area());

    let [result, _, keys] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(inner);
    frame.render_widget(
        Paragraph::new(view.result.as_str()).style(Style::default().add_modifier(Modifier::BOLD)),
        result,
    );
    frame.render_widget(Paragraph::new(footer(view.show_back, &view.accept_hint)), keys);
}

fn prompt_error(title: &str, err: &io::Error) -> HostError {
    HostError::PromptFailed(title.to_string(), err.to_string())
}

/// Prompt and editor host for the command line. The "selection" is text
/// handed over on the command line; replacements are printed to stdout.
#[derive(Default)]
pub struct TerminalHost {
    selection: Mutex<Option<String>>,
}

impl TerminalHost {
    pub fn new(selection: Option<String>) -> Self {
        Self {
            selection: Mutex::new(selection),
        }
    }

    pub fn set_selection(&self, selection: Option<String>) {
        *self.selection.lock().unwrap_or_else(PoisonError::into_inner) = selection;
    }

    fn clipboard() -> Result<arboard::Clipboard, HostError> {
        arboard::Clipboard::new().map_err(|e| HostError::Clipboard(e.to_string()))
    }

    fn run_text(&self, prompt: &TextPrompt, validate: LiveValidator<'_>) -> io::Result<PromptEvent<String>> {
        let mut session = TerminalSession::open(TEXT_HEIGHT)?;
        let mut textarea = TextArea::new(vec![prompt.value.clone()]);
        textarea.set_placeholder_text(prompt.placeholder.clone());
        textarea.set_cursor_line_style(Style::default());
        textarea.move_cursor(CursorMove::End);
        let mut diagnostic = prompt.validation_message.clone();

        loop {
            session
                .terminal
                .draw(|frame| render_text(frame, prompt, &textarea, diagnostic.as_deref()))?;
            let Some(key) = next_key(prompt.ignore_focus_out)? else {
                return Ok(PromptEvent::Dismissed);
            };
            match classify_key(&key, prompt.show_back) {
                KeyAction::Accept => return Ok(PromptEvent::Accepted(textarea.lines().concat())),
                KeyAction::Back => return Ok(PromptEvent::Back),
                KeyAction::Dismiss => return Ok(PromptEvent::Dismissed),
                KeyAction::Up | KeyAction::Down => {}
                KeyAction::Edit => {
                    if textarea.input(key) {
                        diagnostic = validate(&textarea.lines().concat());
                    }
                }
            }
        }
    }

    fn run_choice(&self, prompt: &ChoicePrompt) -> io::Result<PromptEvent<usize>> {
        let height = (prompt.items.len() as u16 + 4).min(MAX_CHOICE_HEIGHT);
        let mut session = TerminalSession::open(height)?;
        let mut filter = String::new();
        let mut visible = filter_items(&prompt.items, &filter);
        let mut state = ListState::default();
        state.select(Some(
            prompt
                .active
                .and_then(|active| visible.iter().position(|i| *i == active))
                .unwrap_or(0),
        ));

        loop {
            session
                .terminal
                .draw(|frame| render_choice(frame, prompt, &visible, &filter, &mut state))?;
            let Some(key) = next_key(prompt.ignore_focus_out)? else {
                return Ok(PromptEvent::Dismissed);
            };
            match classify_key(&key, prompt.show_back) {
                KeyAction::Accept => {
                    if let Some(index) = state.selected().and_then(|s| visible.get(s)) {
                        return Ok(PromptEvent::Accepted(*index));
                    }
                }
                KeyAction::Back => return Ok(PromptEvent::Back),
                KeyAction::Dismiss => return Ok(PromptEvent::Dismissed),
                KeyAction::Up => state.select_previous(),
                KeyAction::Down => state.select_next(),
                KeyAction::Edit => {
                    match key.code {
                        KeyCode::Char(c) => filter.push(c),
                        KeyCode::Backspace => {
                            filter.pop();
                        }
                        _ => continue,
                    }
                    visible = filter_items(&prompt.items, &filter);
                    state.select(if visible.is_empty() { None } else { Some(0) });
                }
            }
        }
    }

    fn run_result(&self, view: &ResultView) -> io::Result<ResultAction> {
        let mut session = TerminalSession::open(RESULT_HEIGHT)?;
        loop {
            session.terminal.draw(|frame| render_result(frame, view))?;
            let Some(key) = next_key(view.ignore_focus_out)? else {
                return Ok(ResultAction::Dismissed);
            };
            match classify_key(&key, view.show_back) {
                KeyAction::Accept => return Ok(ResultAction::Accept),
                KeyAction::Back => return Ok(ResultAction::Back),
                KeyAction::Dismiss => return Ok(ResultAction::Dismissed),
                _ => {}
            }
        }
    }
}

#[async_trait]
impl PromptHost for TerminalHost {
    async fn prompt_text(
        &self,
        prompt: &TextPrompt,
        validate: LiveValidator<'_>,
    ) -> Result<PromptEvent<String>, HostError> {
        tokio::task::block_in_place(|| self.run_text(prompt, validate))
            .map_err(|e| prompt_error(&prompt.title, &e))
    }

    async fn prompt_choice(&self, prompt: &ChoicePrompt) -> Result<PromptEvent<usize>, HostError> {
        tokio::task::block_in_place(|| self.run_choice(prompt)).map_err(|e| prompt_error(&prompt.title, &e))
    }
}

#[async_trait]
impl EditorHost for TerminalHost {
    fn selection(&self) -> Option<String> {
        self.selection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn replace_selection(&self, text: &str) -> Result<(), HostError> {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", text)?;
        Ok(())
    }

    async fn read_clipboard(&self) -> Result<Option<String>, HostError> {
        match Self::clipboard()?.get_text() {
            Ok(text) => Ok(Some(text).filter(|t| !t.trim().is_empty())),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(HostError::Clipboard(e.to_string())),
        }
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), HostError> {
        Self::clipboard()?
            .set_text(text)
            .map_err(|e| HostError::Clipboard(e.to_string()))
    }

    async fn show_result(&self, view: &ResultView) -> Result<ResultAction, HostError> {
        tokio::task::block_in_place(|| self.run_result(view)).map_err(|e| prompt_error(&view.title, &e))
    }

    fn show_info(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn show_error(&self, message: &str) {
        eprintln!("error: {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_classify_keys() {
        assert_eq!(classify_key(&key(KeyCode::Enter, KeyModifiers::NONE), false), KeyAction::Accept);
        assert_eq!(classify_key(&key(KeyCode::Esc, KeyModifiers::NONE), false), KeyAction::Dismiss);
        assert_eq!(
            classify_key(&key(KeyCode::Char('c'), KeyModifiers::CONTROL), false),
            KeyAction::Dismiss
        );
        assert_eq!(classify_key(&key(KeyCode::Char('x'), KeyModifiers::NONE), true), KeyAction::Edit);
    }

    #[test]
    fn test_back_keys_only_when_offered() {
        let ctrl_b = key(KeyCode::Char('b'), KeyModifiers::CONTROL);
        let alt_left = key(KeyCode::Left, KeyModifiers::ALT);
        assert_eq!(classify_key(&ctrl_b, true), KeyAction::Back);
        assert_eq!(classify_key(&alt_left, true), KeyAction::Back);
        assert_eq!(classify_key(&ctrl_b, false), KeyAction::Edit);
        assert_eq!(classify_key(&alt_left, false), KeyAction::Edit);
    }

    #[test]
    fn test_progress_title() {
        assert_eq!(progress_title("Epoch", 2, 3), " Epoch (2/3) ");
        assert_eq!(progress_title("Epoch", 1, 1), " Epoch ");
    }

    #[test]
    fn test_filter_items() {
        let items = vec![
            ChoiceItem::new("Seconds").with_description("s"),
            ChoiceItem::new("Milliseconds").with_description("ms"),
            ChoiceItem::new("YYYY-MM-DD"),
        ];
        assert_eq!(filter_items(&items, ""), vec![0, 1, 2]);
        assert_eq!(filter_items(&items, "milli"), vec![1]);
        assert_eq!(filter_items(&items, "MS"), vec![1]);
        assert_eq!(filter_items(&items, "yyyy"), vec![2]);
        assert!(filter_items(&items, "hours").is_empty());
    }

    #[test]
    fn test_selection_roundtrip() {
        let host = TerminalHost::new(Some("1700000000".to_string()));
        assert_eq!(host.selection().as_deref(), Some("1700000000"));
        host.set_selection(None);
        assert!(host.selection().is_none());
    }

    #[test]
    fn test_panic_hook_installs_once() {
        install_panic_hook();
        assert!(!install_panic_hook());
        // No prompt is open, so a panic leaves the terminal alone
        assert!(!restore_open_session());
    }
}
