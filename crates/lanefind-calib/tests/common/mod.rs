pub mod synthetic_board;
