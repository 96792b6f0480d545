fn main() -> anyhow::Result<()> {
    evbench::run()
}
