pub mod agent;
pub mod maze;

// Re-export commonly used types at the model level.
pub use agent::{Agent, Heading, Position};
pub use maze::{Cell, Maze, MazeError};
