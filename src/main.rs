fn main() {
    upca_voice_lib::run()
}
