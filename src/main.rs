fn main() {
    taiko_cup_archive::run()
}
