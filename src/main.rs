fn main() {
    soil_recon::cli::run();
}
