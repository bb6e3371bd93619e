fn main() {
    scratchminer::main();
}
