//! Score command implementation.

pub fn execute(text: &str) {
    println!("{}", crucible_training::score(text));
}
