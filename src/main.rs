fn main() {
    triage_dialogue::run()
}
