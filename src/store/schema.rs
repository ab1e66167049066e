diesel::table! {
    ais (ai_id) {
        ai_id -> Text,
        creator_address -> Text,
        created_at -> BigInt,
        name -> Text,
        image_url -> Text,
        category -> Text,
        introductions -> Text,
        chat_counts -> BigInt,
        prompt_tokens -> BigInt,
        completion_tokens -> BigInt,
        weekly_users -> BigInt,
    }
}

diesel::table! {
    rag_logs (id) {
        id -> Integer,
        ai_id -> Text,
        created_at -> BigInt,
        comments -> Text,
        tx_hash -> Text,
        tx_url -> Text,
        faiss_id -> Text,
    }
}

diesel::table! {
    users (user_address) {
        user_address -> Text,
        nickname -> Text,
        created_at -> BigInt,
    }
}

diesel::joinable!(rag_logs -> ais (ai_id));

diesel::allow_tables_to_appear_in_same_query!(ais, rag_logs, users);
