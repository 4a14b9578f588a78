use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// Side length of the (square) board.
pub const SIZE: usize = 3;

/// A tile at least this large ends the game.
pub const WIN_TILE: Tile = 2048;

/// Bonus added by [`State::payoff`] once [`WIN_TILE`] is on the board.
pub const WIN_BONUS: Score = 100_000;

/// Spawnable tiles and their probabilities.
pub const SPAWN_OUTCOMES: [(Tile, f64); 2] = [(2, 0.9), (4, 0.1)];

pub type Tile = u32;
pub type Score = u64;
pub type Line = [Tile; SIZE];

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All directions, in the order legal actions are reported.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    pub fn name(self) -> &'static str {
        match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Move {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "u" => Ok(Move::Up),
            "down" | "d" => Ok(Move::Down),
            "left" | "l" => Ok(Move::Left),
            "right" | "r" => Ok(Move::Right),
            _ => Err(EngineError::UnknownMove(s.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid tile {value} at ({row}, {col}): expected 0 or a power of two >= 2")]
    InvalidTile { row: usize, col: usize, value: Tile },
    #[error("unknown move {0:?}")]
    UnknownMove(String),
}

/// Row-major 3x3 grid of tile values; 0 marks an empty cell.
///
/// `Board` is `Copy`, so every state derived from another owns its own grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board([Line; SIZE]);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board([[0; SIZE]; SIZE]);

    /// Build a board from explicit rows, rejecting values that are neither 0
    /// nor a power of two >= 2.
    ///
    /// ```
    /// use duel_2048::engine::Board;
    /// let b = Board::from_rows([[2, 2, 0], [0, 0, 0], [0, 0, 0]]).unwrap();
    /// assert_eq!(b.count_empty(), 7);
    /// assert!(Board::from_rows([[3, 0, 0], [0, 0, 0], [0, 0, 0]]).is_err());
    /// ```
    pub fn from_rows(rows: [Line; SIZE]) -> Result<Self, EngineError> {
        for (row, line) in rows.iter().enumerate() {
            for (col, &value) in line.iter().enumerate() {
                if !is_valid_tile(value) {
                    return Err(EngineError::InvalidTile { row, col, value });
                }
            }
        }
        Ok(Board(rows))
    }

    #[inline]
    pub fn rows(&self) -> &[Line; SIZE] { &self.0 }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Tile { self.0[row][col] }

    /// Slide/merge tiles in `dir` (no random insert), returning the new board
    /// and the sum of all merged values created by the move.
    ///
    /// ```
    /// use duel_2048::engine::{Board, Move};
    /// let b = Board::from_rows([[2, 2, 0], [0, 0, 0], [0, 0, 0]]).unwrap();
    /// let (moved, gain) = b.slide(Move::Left);
    /// assert_eq!(moved.rows()[0], [4, 0, 0]);
    /// assert_eq!(gain, 4);
    /// ```
    pub fn slide(self, dir: Move) -> (Board, Score) {
        let mut out = [[0; SIZE]; SIZE];
        let mut gain = 0;
        for idx in 0..SIZE {
            let mut line = [0; SIZE];
            for (k, slot) in line.iter_mut().enumerate() {
                let (r, c) = line_cell(dir, idx, k);
                *slot = self.0[r][c];
            }
            let (merged, line_gain) = merge_line(line);
            for (k, &tile) in merged.iter().enumerate() {
                let (r, c) = line_cell(dir, idx, k);
                out[r][c] = tile;
            }
            gain += line_gain;
        }
        (Board(out), gain)
    }

    /// Like [`Board::slide`] but drops the score gain.
    #[inline]
    pub fn shift(self, dir: Move) -> Board { self.slide(dir).0 }

    /// Insert a 2 (90%) or 4 (10%) into a uniformly chosen empty cell.
    /// A full board is returned unchanged.
    ///
    /// ```
    /// use duel_2048::engine::Board;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(b.count_empty(), 7);
    /// ```
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let empty = self.empty_cells();
        match empty.choose(rng) {
            Some(&(row, col)) => {
                let (two, p_two) = SPAWN_OUTCOMES[0];
                let value = if rng.gen::<f64>() < p_two { two } else { SPAWN_OUTCOMES[1].0 };
                self.with_tile(row, col, value)
            }
            None => self,
        }
    }

    /// Place `value` at `(row, col)`.
    #[inline]
    pub fn with_tile(mut self, row: usize, col: usize, value: Tile) -> Self {
        debug_assert!(is_valid_tile(value), "tile {value} is not a power of two");
        self.0[row][col] = value;
        self
    }

    /// Coordinates of empty cells in row-major order.
    pub fn empty_cells(&self) -> Vec<(usize, usize)> {
        let mut cells = Vec::with_capacity(SIZE * SIZE);
        for (r, line) in self.0.iter().enumerate() {
            for (c, &tile) in line.iter().enumerate() {
                if tile == 0 {
                    cells.push((r, c));
                }
            }
        }
        cells
    }

    #[inline]
    pub fn count_empty(&self) -> usize {
        self.0.iter().flatten().filter(|&&t| t == 0).count()
    }

    /// Highest tile value on the board (0 for an empty board).
    #[inline]
    pub fn highest_tile(&self) -> Tile {
        self.0.iter().flatten().copied().max().unwrap_or(0)
    }

    /// Values of the four corner cells.
    #[inline]
    pub fn corners(&self) -> [Tile; 4] {
        let last = SIZE - 1;
        [self.0[0][0], self.0[0][last], self.0[last][0], self.0[last][last]]
    }

    #[inline]
    pub fn has_win_tile(&self) -> bool { self.highest_tile() >= WIN_TILE }

    /// True if no move in any direction changes the board.
    pub fn is_game_over(&self) -> bool {
        Move::ALL.iter().all(|&dir| self.shift(dir) == *self)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, line) in self.0.iter().enumerate() {
            let cells: Vec<String> = line
                .iter()
                .map(|&v| if v == 0 { "   .".to_string() } else { format!("{v:4}") })
                .collect();
            write!(f, "{}", cells.join(" "))?;
            if r + 1 < SIZE {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

impl TryFrom<[Line; SIZE]> for Board {
    type Error = EngineError;
    fn try_from(rows: [Line; SIZE]) -> Result<Self, Self::Error> { Board::from_rows(rows) }
}

/// Board plus cumulative score. Transitions always build a new `State`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct State {
    board: Board,
    score: Score,
}

impl State {
    #[inline]
    pub fn new(board: Board, score: Score) -> Self { State { board, score } }

    /// Empty board with two spawned tiles and zero score.
    pub fn initial<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let board = Board::EMPTY.with_random_tile(rng).with_random_tile(rng);
        State::new(board, 0)
    }

    #[inline]
    pub fn board(&self) -> &Board { &self.board }

    #[inline]
    pub fn score(&self) -> Score { self.score }

    /// Directions whose resolution changes the board, in [`Move::ALL`] order.
    pub fn legal_actions(&self) -> Vec<Move> {
        Move::ALL
            .iter()
            .copied()
            .filter(|&dir| self.board.shift(dir) != self.board)
            .collect()
    }

    /// Resolve `dir`, add the merge gain to the score, then spawn one random tile.
    pub fn successor<R: Rng + ?Sized>(&self, dir: Move, rng: &mut R) -> State {
        let (moved, gain) = self.board.slide(dir);
        State::new(moved.with_random_tile(rng), self.score + gain)
    }

    /// The state reached by resolving `dir` without spawning.
    #[inline]
    pub fn resolve(&self, dir: Move) -> State {
        let (moved, gain) = self.board.slide(dir);
        State::new(moved, self.score + gain)
    }

    pub fn is_terminal(&self) -> bool {
        self.board.has_win_tile() || self.board.is_game_over()
    }

    /// Score, plus [`WIN_BONUS`] when the win tile is present.
    pub fn payoff(&self) -> Score {
        if self.board.has_win_tile() { self.score + WIN_BONUS } else { self.score }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Score: {}", self.score)?;
        write!(f, "{}", self.board)
    }
}

/// Start a game: empty board with two random tiles.
pub fn initial_state<R: Rng + ?Sized>(rng: &mut R) -> State { State::initial(rng) }

pub fn legal_actions(state: &State) -> Vec<Move> { state.legal_actions() }

pub fn successor<R: Rng + ?Sized>(state: &State, dir: Move, rng: &mut R) -> State {
    state.successor(dir, rng)
}

pub fn is_terminal(state: &State) -> bool { state.is_terminal() }

pub fn payoff(state: &State) -> Score { state.payoff() }

/// Compact one line toward index 0, merging each equal neighbor pair once.
/// Returns the new line and the sum of the merged values.
pub fn merge_line(line: Line) -> (Line, Score) {
    let mut tiles = line.iter().copied().filter(|&t| t != 0).peekable();
    let mut out = [0; SIZE];
    let mut gain = 0;
    let mut len = 0;
    while let Some(tile) = tiles.next() {
        out[len] = if tiles.next_if_eq(&tile).is_some() {
            gain += Score::from(tile * 2);
            tile * 2
        } else {
            tile
        };
        len += 1;
    }
    (out, gain)
}

#[inline]
fn is_valid_tile(value: Tile) -> bool { value == 0 || (value >= 2 && value.is_power_of_two()) }

/// Board cell holding element `k` of line `idx` when that line is read in the
/// direction tiles travel for `dir`.
#[inline]
fn line_cell(dir: Move, idx: usize, k: usize) -> (usize, usize) {
    let last = SIZE - 1;
    match dir {
        Move::Left => (idx, k),
        Move::Right => (idx, last - k),
        Move::Up => (k, idx),
        Move::Down => (last - k, idx),
    }
}
