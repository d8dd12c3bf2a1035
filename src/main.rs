fn main() -> anyhow::Result<()> {
    collada_viewer::run()
}
