fn main() -> anyhow::Result<()> {
    fluent_check_lib::run()
}
