//! Board generation.

use bingo_protocol::{BOARD_SIZE, Board, CENTER_INDEX, Square, TileConfig};
use rand::Rng;
use rand::seq::SliceRandom;

/// Text used for cells left over when a config has fewer than 24 tiles.
pub const PLACEHOLDER_TILE: &str = "Extra";

/// Deals a fresh board from the configured tiles.
///
/// The tiles are shuffled with a uniform Fisher–Yates permutation and laid
/// out row-major into the 24 non-center cells. The center is always the
/// pre-marked free space. Extra tiles beyond 24 go unused; missing ones are
/// filled with [`PLACEHOLDER_TILE`].
pub fn generate_board<R: Rng + ?Sized>(
    tiles: &[TileConfig],
    rng: &mut R,
) -> Board {
    let mut shuffled: Vec<&str> =
        tiles.iter().map(|tile| tile.text.as_str()).collect();
    shuffled.shuffle(rng);
    let mut dealt = shuffled.into_iter();

    std::array::from_fn(|row| {
        std::array::from_fn(|column| {
            if row * BOARD_SIZE + column == CENTER_INDEX {
                Square::free_space()
            } else {
                Square::new(dealt.next().unwrap_or(PLACEHOLDER_TILE))
            }
        })
    })
}
