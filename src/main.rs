#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rag_chat_lib::run().await
}
