use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(string(Movies::Id).primary_key())
                    .col(string(Movies::Title))
                    .col(text(Movies::Description))
                    .col(string(Movies::FoldedTitle))
                    .col(text(Movies::FoldedDescription))
                    .col(integer(Movies::Duration))
                    .col(string(Movies::WatchUrl))
                    .col(big_integer(Movies::CreatedAt))
                    .col(big_integer(Movies::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Genres::Table)
                    .if_not_exists()
                    .col(pk_auto(Genres::Id))
                    .col(string_uniq(Genres::Name))
                    .col(string(Genres::FoldedName))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Artists::Table)
                    .if_not_exists()
                    .col(string(Artists::Id).primary_key())
                    .col(string_uniq(Artists::Name))
                    .col(string(Artists::FoldedName))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MovieGenres::Table)
                    .if_not_exists()
                    .col(string(MovieGenres::MovieId))
                    .col(integer(MovieGenres::GenreId))
                    .primary_key(Index::create().col(MovieGenres::MovieId).col(MovieGenres::GenreId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_genres_movie")
                            .from(MovieGenres::Table, MovieGenres::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_genres_genre")
                            .from(MovieGenres::Table, MovieGenres::GenreId)
                            .to(Genres::Table, Genres::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MovieArtists::Table)
                    .if_not_exists()
                    .col(string(MovieArtists::MovieId))
                    .col(string(MovieArtists::ArtistId))
                    .primary_key(
                        Index::create().col(MovieArtists::MovieId).col(MovieArtists::ArtistId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_artists_movie")
                            .from(MovieArtists::Table, MovieArtists::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_artists_artist")
                            .from(MovieArtists::Table, MovieArtists::ArtistId)
                            .to(Artists::Table, Artists::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MovieViews::Table)
                    .if_not_exists()
                    .col(string(MovieViews::MovieId).primary_key())
                    .col(big_integer(MovieViews::ViewCount))
                    .col(big_integer(MovieViews::LastViewedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_views_movie")
                            .from(MovieViews::Table, MovieViews::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_views_view_count")
                    .table(MovieViews::Table)
                    .col(MovieViews::ViewCount)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(MovieViews::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(MovieArtists::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(MovieGenres::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Artists::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Genres::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Id,
    Title,
    Description,
    FoldedTitle,
    FoldedDescription,
    Duration,
    WatchUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Genres {
    Table,
    Id,
    Name,
    FoldedName,
}

#[derive(DeriveIden)]
enum Artists {
    Table,
    Id,
    Name,
    FoldedName,
}

#[derive(DeriveIden)]
enum MovieGenres {
    Table,
    MovieId,
    GenreId,
}

#[derive(DeriveIden)]
enum MovieArtists {
    Table,
    MovieId,
    ArtistId,
}

#[derive(DeriveIden)]
enum MovieViews {
    Table,
    MovieId,
    ViewCount,
    LastViewedAt,
}
