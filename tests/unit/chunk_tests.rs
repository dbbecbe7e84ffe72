use mini_claw::bot::chunk::{split_message, MAX_MESSAGE_LENGTH};

#[test]
fn short_text_is_one_chunk() {
    assert_eq!(split_message("hello", MAX_MESSAGE_LENGTH), vec!["hello".to_owned()]);
    assert_eq!(split_message("", MAX_MESSAGE_LENGTH), vec![String::new()]);
}

#[test]
fn prefers_newline_in_second_half() {
    let text = "aaaaaaa\nbbbbbbbbbb";
    assert_eq!(split_message(text, 10), vec!["aaaaaaa", "bbbbbbbbbb"]);
}

#[test]
fn falls_back_to_space() {
    let text = "aaaaaa bbbbbbbbb";
    assert_eq!(split_message(text, 10), vec!["aaaaaa", "bbbbbbbbb"]);
}

#[test]
fn early_break_points_are_ignored() {
    // The only newline sits in the first half of the window.
    let text = "ab\ncdefghijklmnop";
    assert_eq!(split_message(text, 10), vec!["ab\ncdefghi", "jklmnop"]);
}

#[test]
fn hard_split_respects_char_boundaries() {
    let text = "é".repeat(25);
    let chunks = split_message(&text, 10);

    assert_eq!(chunks.len(), 3);
    assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 10));
    assert_eq!(chunks.concat(), text);
}

#[test]
fn every_chunk_fits_the_limit() {
    let text = "lorem ipsum dolor sit amet\n".repeat(400);
    let chunks = split_message(&text, MAX_MESSAGE_LENGTH);

    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.chars().count() <= MAX_MESSAGE_LENGTH));
    assert!(chunks.iter().skip(1).all(|c| !c.starts_with(char::is_whitespace)));
}
