fn main() -> anyhow::Result<()> {
    benchlens::run()
}
