fn main() {
  ordswap::main();
}
