//! Database schema definitions for Diesel.

diesel::table! {
    users (id) {
        id -> Integer,
        username -> Text,
        company_id -> Integer,
        admin_role -> Bool,
        simple_admin_role -> Bool,
        sub_admin_role -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    playlists (playlist_id) {
        playlist_id -> Integer,
        uid -> Integer,
        company_id -> Integer,
        playlist_name -> Text,
        playlist_mode -> Text,
        time_limit -> BigInt,
        shuffle -> Bool,
        shuffle_picking -> Integer,
        multizone -> Nullable<Text>,
        duration -> BigInt,
        owner_duration -> BigInt,
        filesize -> BigInt,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    items (item_id) {
        item_id -> Integer,
        playlist_id -> Integer,
        uid -> Integer,
        item_type -> Text,
        file_resource -> Text,
        item_name -> Text,
        item_duration -> Double,
        item_filesize -> BigInt,
        item_order -> Integer,
        disabled -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

// Define foreign key relationships
diesel::joinable!(items -> playlists (playlist_id));
diesel::joinable!(playlists -> users (uid));

diesel::allow_tables_to_appear_in_same_query!(users, playlists, items,);
