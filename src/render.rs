//! ANSI terminal rendering for watching a game.

use std::time::Duration;

use crate::engine::{Move, State, Tile, SIZE};

/// Clears the screen and homes the cursor.
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

const RESET: &str = "\x1b[0m";
const CELL_WIDTH: usize = 7;

/// ANSI color used for a tile value.
pub fn tile_color(value: Tile) -> &'static str {
    match value {
        0 => "\x1b[90m",
        2 => "\x1b[97m",
        4 => "\x1b[93m",
        8 => "\x1b[33m",
        16 => "\x1b[91m",
        32 => "\x1b[31m",
        64 => "\x1b[95m",
        128 => "\x1b[94m",
        256 => "\x1b[96m",
        512 => "\x1b[92m",
        1024 => "\x1b[32m",
        2048 => "\x1b[1;93m",
        _ => "\x1b[1;97m",
    }
}

fn border(left: char, mid: char, right: char) -> String {
    let segment = "─".repeat(CELL_WIDTH);
    let inner = vec![segment; SIZE].join(&mid.to_string());
    format!("  {left}{inner}{right}")
}

/// Boxed, colored board with a header line of game stats.
pub fn render_board(state: &State, title: &str, move_number: u32, last_move: Option<Move>, elapsed: Duration) -> String {
    let mut lines = Vec::with_capacity(2 * SIZE + 4);
    lines.push(format!("\n  2048 - {title}"));
    lines.push(format!(
        "  Move: {:<4}  Score: {:<6}  Last: {:<6}  Time: {:.1}s",
        move_number,
        state.score(),
        last_move.map_or("-", Move::name),
        elapsed.as_secs_f64()
    ));
    lines.push(border('┌', '┬', '┐'));
    for (r, row) in state.board().rows().iter().enumerate() {
        let mut line = String::from("  │");
        for &value in row {
            let cell = if value == 0 { "  ·  ".to_string() } else { format!("{value:^5}") };
            line.push_str(&format!(" {}{cell}{RESET} │", tile_color(value)));
        }
        lines.push(line);
        if r + 1 < SIZE {
            lines.push(border('├', '┼', '┤'));
        }
    }
    lines.push(border('└', '┴', '┘'));
    lines.join("\n")
}
