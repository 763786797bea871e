use winit::event::VirtualKeyCode;
use winit_input_helper::WinitInputHelper;

use flappy_learning::session::Command;

/// Commands for this frame, in a fixed order.
/// Call after `WinitInputHelper::update` returned true.
pub fn poll_input(input: &WinitInputHelper) -> Vec<Command> {
    let mut commands = Vec::new();
    if input.key_pressed(VirtualKeyCode::Escape) || input.close_requested() || input.destroyed() {
        commands.push(Command::Quit);
    }
    if input.key_pressed(VirtualKeyCode::Space) || input.key_pressed(VirtualKeyCode::Up) {
        commands.push(Command::Flap);
    }
    if input.key_pressed(VirtualKeyCode::S) {
        commands.push(Command::Save);
    }
    if input.key_pressed(VirtualKeyCode::NumpadAdd) || input.key_pressed(VirtualKeyCode::Equals) {
        commands.push(Command::Faster);
    }
    if input.key_pressed(VirtualKeyCode::NumpadSubtract)
        || input.key_pressed(VirtualKeyCode::Minus)
    {
        commands.push(Command::Slower);
    }
    commands
}
