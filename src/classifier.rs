//! Attempt-count → perceived difficulty.

use crate::domain::Difficulty;

/// Maps the number of pseudocode iterations a user needed to a difficulty label.
///
/// `0..=2` is Easy, `3..=4` is Medium, `5+` is Hard.
pub fn classify(iterations: u32) -> Difficulty {
  match iterations {
    0..=2 => Difficulty::Easy,
    3..=4 => Difficulty::Medium,
    _ => Difficulty::Hard,
  }
}

/// Human-readable comparison between the user's experience and the catalog rating.
pub fn comparison_message(user: Difficulty, catalog: Difficulty) -> String {
  if user == catalog {
    "Your experience matches the catalog rating.".to_string()
  } else {
    format!(
      "You found this {} while the catalog rates it as {}.",
      user.as_str().to_lowercase(),
      catalog.as_str().to_lowercase()
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn boundaries_are_exact() {
    assert_eq!(classify(0), Difficulty::Easy);
    assert_eq!(classify(2), Difficulty::Easy);
    assert_eq!(classify(3), Difficulty::Medium);
    assert_eq!(classify(4), Difficulty::Medium);
    assert_eq!(classify(5), Difficulty::Hard);
    assert_eq!(classify(u32::MAX), Difficulty::Hard);
  }

  #[test]
  fn classification_is_monotonic() {
    let labels: Vec<Difficulty> = (0..50).map(classify).collect();
    assert!(labels.windows(2).all(|w| w[0] <= w[1]));
  }

  #[test]
  fn comparison_mentions_both_ratings_on_mismatch() {
    assert_eq!(
      comparison_message(Difficulty::Hard, Difficulty::Easy),
      "You found this hard while the catalog rates it as easy."
    );
    assert!(comparison_message(Difficulty::Medium, Difficulty::Medium).contains("matches"));
  }
}
