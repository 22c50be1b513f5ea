fn main() {
    coupa_invoice_downloader_lib::run()
}
