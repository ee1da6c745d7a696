/// Discrete actions driven by key presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TogglePause,
    ForceReload,
    GrowColumns,
    ShrinkColumns,
    GrowRows,
    ShrinkRows,
    Quit,
}

impl Command {
    /// Whether held-key auto-repeat should fire the command again.
    pub fn repeats(self) -> bool {
        matches!(
            self,
            Command::GrowColumns | Command::ShrinkColumns | Command::GrowRows | Command::ShrinkRows
        )
    }
}

/// Maps the text of a logical key press to a command.
///
/// `{` and `}` are what Shift+`[` and Shift+`]` produce on most layouts, so the
/// row commands follow the layout rather than the physical key.
pub fn command_for_text(text: &str, repeat: bool) -> Option<Command> {
    let command = match text {
        "p" | "P" => Command::TogglePause,
        "r" | "R" => Command::ForceReload,
        "]" => Command::GrowColumns,
        "[" => Command::ShrinkColumns,
        "}" => Command::GrowRows,
        "{" => Command::ShrinkRows,
        _ => return None,
    };
    if repeat && !command.repeats() {
        return None;
    }
    Some(command)
}

/// Last pointer sample, in window coordinates (origin at the top-left).
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct InputState {
    position: Option<[f64; 2]>,
    pressed: bool,
}

impl InputState {
    pub fn handle_cursor_moved(&mut self, x: f64, y: f64) {
        self.position = Some([x, y]);
    }

    pub fn handle_button(&mut self, pressed: bool) {
        self.pressed = pressed;
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Pointer position in pixels with the vertical axis measured from the
    /// bottom of a viewport `height` pixels tall. `[0, 0]` before the pointer
    /// has entered the window.
    pub fn pointer(&self, height: f32) -> [f32; 2] {
        match self.position {
            Some([x, y]) => [x as f32, height - y as f32],
            None => [0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_is_flipped_against_current_height() {
        let mut input = InputState::default();
        assert_eq!(input.pointer(720.0), [0.0, 0.0]);
        input.handle_cursor_moved(100.0, 20.0);
        assert_eq!(input.pointer(720.0), [100.0, 700.0]);
        assert_eq!(input.pointer(480.0), [100.0, 460.0]);
    }

    #[test]
    fn button_tracks_pressed_state() {
        let mut input = InputState::default();
        input.handle_button(true);
        assert!(input.is_pressed());
        input.handle_button(false);
        assert!(!input.is_pressed());
    }

    #[test]
    fn key_map() {
        assert_eq!(command_for_text("p", false), Some(Command::TogglePause));
        assert_eq!(command_for_text("R", false), Some(Command::ForceReload));
        assert_eq!(command_for_text("]", false), Some(Command::GrowColumns));
        assert_eq!(command_for_text("[", false), Some(Command::ShrinkColumns));
        assert_eq!(command_for_text("}", false), Some(Command::GrowRows));
        assert_eq!(command_for_text("{", false), Some(Command::ShrinkRows));
        assert_eq!(command_for_text("x", false), None);
    }

    #[test]
    fn auto_repeat_only_resizes_the_grid() {
        assert_eq!(command_for_text("p", true), None);
        assert_eq!(command_for_text("r", true), None);
        assert_eq!(command_for_text("]", true), Some(Command::GrowColumns));
        assert_eq!(command_for_text("{", true), Some(Command::ShrinkRows));
    }
}
