use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    MoveNext,
    MovePrev,
    PageDown,
    PageUp,
    Open,
    Back,
    Forward,
    Escape,
    FocusNextMenu,
    TabLeft,
    TabRight,
    Retry,
    Abort,
    ToggleAutoRefresh,
    Reload,
    Help,
    None,
}

pub fn map_key(key: KeyEvent) -> Action {
    // Only the initial press; repeats and releases would double actions.
    if key.kind != KeyEventKind::Press {
        return Action::None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    match key.code {
        KeyCode::Char('c') if ctrl => Action::Quit,
        KeyCode::Char('r') if ctrl => Action::Reload,
        KeyCode::Left if alt => Action::Back,
        KeyCode::Right if alt => Action::Forward,
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Down | KeyCode::Char('j') => Action::MoveNext,
        KeyCode::Up | KeyCode::Char('k') => Action::MovePrev,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::Enter => Action::Open,
        KeyCode::Backspace => Action::Back,
        KeyCode::Esc => Action::Escape,
        KeyCode::Tab => Action::FocusNextMenu,
        KeyCode::Left => Action::TabLeft,
        KeyCode::Right => Action::TabRight,
        KeyCode::Char('r') => Action::Retry,
        KeyCode::Char('a') => Action::Abort,
        KeyCode::Char('f') => Action::ToggleAutoRefresh,
        KeyCode::Char('?') => Action::Help,
        _ => Action::None,
    }
}
