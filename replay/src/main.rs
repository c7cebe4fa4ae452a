//! replay binary.

fn main() {
    if let Err(e) = replay::run_cli() {
        eprintln!("{e:?}");
        std::process::exit(1);
    }
}
