fn main() -> anyhow::Result<()> {
    taskly::cli::run()
}
