//! Character avatar lookup.

/// Character id reserved for the administrative client.
pub const ADMIN_CHARACTER_ID: i64 = 99;

const AVATARS: [&str; 6] = [
    "assets/characterProfile/character1.png",
    "assets/characterProfile/character2.png",
    "assets/characterProfile/character3.png",
    "assets/characterProfile/character4.png",
    "assets/characterProfile/character5.png",
    "assets/characterProfile/character6.png",
];

/// Avatar asset for a character, if one exists.
///
/// Only the playable characters 1-6 have avatars; the administrative id and
/// anything unknown yield `None`.
#[must_use]
pub fn avatar_for(character_id: i64) -> Option<&'static str> {
    usize::try_from(character_id)
        .ok()
        .and_then(|id| id.checked_sub(1))
        .and_then(|index| AVATARS.get(index))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_characters() {
        assert_eq!(avatar_for(1), Some("assets/characterProfile/character1.png"));
        assert_eq!(avatar_for(6), Some("assets/characterProfile/character6.png"));
    }

    #[test]
    fn test_unmapped_characters() {
        for id in [0, 7, ADMIN_CHARACTER_ID, -1, i64::MIN, i64::MAX] {
            assert_eq!(avatar_for(id), None, "id {id}");
        }
    }
}
