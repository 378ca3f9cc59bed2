mod activation;
mod console;
