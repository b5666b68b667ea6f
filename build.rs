fn main() {
    cli_batteries::build_rs().unwrap();
}
