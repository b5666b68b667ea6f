fn main() {
    cli_batteries::run(cli_batteries::version!(), session_orchestrator::async_main);
}
